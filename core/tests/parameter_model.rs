use apiprobe_core::params::{NodeKind, Operation, Template};
use apiprobe_core::{AppError, Context, StructuralPath};
use pretty_assertions::assert_eq;
use serde_json::json;

const DESCRIPTOR: &str = r#"
operationId: updatePet
method: PUT
endpoint: /owners/{ownerId}/pets
parameters:
  - name: ownerId
    in: path
    schema:
      type: integer
      format: int64
      x-crudResourceIdentifier: true
  - name: tags
    in: query
    schema:
      type: array
      items:
        type: string
        enum: [cat, dog]
  - name: limit
    in: query
    schema:
      allOf:
        - type: integer
          maximum: 20
        - type: integer
          maximum: 10
          exclusiveMaximum: true
requestBody:
  contentType: application/json
  schema:
    type: object
    properties:
      name:
        type: string
        example: Rex
      owner:
        oneOf:
          - type: object
            properties:
              id:
                type: integer
          - type: string
      toys:
        type: array
        items:
          type: object
          properties:
            label:
              type: string
responses:
  "200":
    type: object
    properties:
      id:
        type: integer
"#;

fn template() -> Template {
    Template::from_yaml_str(DESCRIPTOR).unwrap()
}

/// A draft with every array holding elements and every combined schema resolved.
fn populated_draft() -> Operation {
    let mut draft = template().to_draft();
    let mut ctx = Context::default();
    ctx.populate_request(&mut draft).unwrap();
    draft
        .set_actual_response(&json!({"id": 4, "tags": ["a", "b"]}))
        .unwrap();
    draft
}

#[test]
fn test_descriptor_builds_every_part() {
    let template = template();
    assert!(template.is_read_only());
    assert_eq!(template.parameters().len(), 3);
    assert!(template.request_body().is_some());
    assert_eq!(template.responses().len(), 1);

    let owner = template.find_by_name("ownerId")[0];
    let node = template.node(owner).unwrap();
    assert!(node.is_required());
    assert!(node.is_resource_identifier());
}

#[test]
fn test_paths_round_trip_for_every_node() {
    let op = populated_draft();
    let ids = op.all_nodes();
    assert!(ids.len() > 20);

    for id in ids {
        let structural = op.structural_path(id).unwrap();
        let reparsed: StructuralPath = structural.to_string().parse().unwrap();
        assert_eq!(reparsed, structural);
        assert_eq!(
            op.resolve_structural(op.root_of(id), &reparsed).unwrap(),
            id,
            "{}",
            structural
        );

        let rest = op.rest_path(id).unwrap();
        assert_eq!(op.resolve_rest_str(&rest.to_string()).unwrap(), id, "{}", rest);
    }
}

#[test]
fn test_paths_follow_reordered_elements() {
    let mut op = populated_draft();
    let tags = op.find_by_name("tags")[0];
    let NodeKind::Array(array) = op.node(tags).unwrap().kind().clone() else {
        panic!("tags should be an array");
    };
    assert!(!array.elements.is_empty());
    let element = op.new_element(tags).unwrap();
    op.move_element(tags, array.elements.len(), 0).unwrap();

    let path = op.structural_path(element).unwrap();
    assert_eq!(path.to_string(), r#"$["tags"][0]"#);
    let reference = op.structural_path(array.reference_element).unwrap();
    assert_eq!(reference.to_string(), r#"$["tags"][-1]"#);
    assert_eq!(op.resolve_rest_str(r#"$["request"]["query"]["tags"][0]"#).unwrap(), element);
}

#[test]
fn test_clones_are_independent() {
    let template = template();
    let original_body = template.to_json(template.request_body().unwrap());

    let mut draft = template.to_draft();
    let name = draft.find_by_name("name")[0];
    draft.set_value(name, json!("Fido")).unwrap();
    draft.add_example(name, json!("Bella")).unwrap();
    let tags = draft.find_by_name("tags")[0];
    let NodeKind::Array(array) = draft.node(tags).unwrap().kind().clone() else {
        panic!("tags should be an array");
    };
    draft.add_enum_value(array.reference_element, json!("bird")).unwrap();
    let owner = draft.find_by_name("owner")[0];
    draft.merge(owner).unwrap();

    assert_eq!(template.to_json(template.request_body().unwrap()), original_body);
    let original_name = template.find_by_name("name")[0];
    assert_eq!(template.node(original_name).unwrap().examples(), &[json!("Rex")]);
    let original_tags = template.find_by_name("tags")[0];
    let NodeKind::Array(original_array) = template.node(original_tags).unwrap().kind() else {
        panic!("tags should be an array");
    };
    assert_eq!(
        template
            .node(original_array.reference_element)
            .unwrap()
            .enum_values(),
        &[json!("cat"), json!("dog")]
    );
    let original_owner = template.find_by_name("owner")[0];
    assert_eq!(
        template.node(original_owner).unwrap().kind().combined().unwrap().candidates.len(),
        2
    );
}

const MUTATORS: [&str; 11] = [
    "set_value",
    "clear_value",
    "add_example",
    "add_enum_value",
    "set_required",
    "set_default_value",
    "set_max_length",
    "merge",
    "new_element",
    "clear_elements",
    "remove_node",
];

fn mutate(op: &mut Operation, mutator: &str) -> Result<(), AppError> {
    let name = op.find_by_name("name")[0];
    let limit = op.find_by_name("limit")[0];
    let tags = op.find_by_name("tags")[0];
    match mutator {
        "set_value" => op.set_value(name, json!("x")),
        "clear_value" => op.clear_value(name),
        "add_example" => op.add_example(name, json!("x")).map(|_| ()),
        "add_enum_value" => op.add_enum_value(name, json!("x")).map(|_| ()),
        "set_required" => op.set_required(name, true),
        "set_default_value" => op.set_default_value(name, json!("x")),
        "set_max_length" => op.set_max_length(name, Some(3)),
        "merge" => op.merge(limit).map(|_| ()),
        "new_element" => op.new_element(tags).map(|_| ()),
        "clear_elements" => op.clear_elements(tags),
        "remove_node" => op.remove_node(name),
        other => panic!("unknown mutator {}", other),
    }
}

#[test]
fn test_read_only_operations_reject_every_mutator() {
    let template = template();
    let mut frozen: Operation = (*template).clone();
    let mut draft = template.to_draft();
    assert!(!draft.is_read_only());

    for mutator in MUTATORS {
        let err = mutate(&mut frozen, mutator).unwrap_err();
        assert!(err.is_read_only(), "{} should be rejected, got {}", mutator, err);
        mutate(&mut draft, mutator)
            .unwrap_or_else(|e| panic!("{} failed on a draft: {}", mutator, e));
    }
    assert!(frozen.find_by_name("name").len() == 1);
    assert!(draft.find_by_name("name").is_empty());
}

#[test]
fn test_all_of_narrows_bounds() {
    let mut draft = template().to_draft();
    let limit = draft.find_by_name("limit")[0];
    let merged = draft.merge(limit).unwrap();
    let NodeKind::Number(leaf) = draft.node(merged).unwrap().kind() else {
        panic!("merged limit should be numeric");
    };
    assert_eq!(leaf.maximum, Some(10.0));
    assert!(leaf.exclusive_maximum);
}
