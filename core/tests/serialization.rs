use apiprobe_core::params::{Operation, Template};
use apiprobe_core::{render, render_declared, NodeId, ParameterStyle};
use pretty_assertions::assert_eq;
use serde_json::json;

const DESCRIPTOR: &str = r#"
operationId: search
method: GET
endpoint: /items/{anArray}
parameters:
  - name: anArray
    in: path
    schema:
      type: array
      items:
        type: string
  - name: anObject
    in: query
    style: deepObject
    explode: true
    schema:
      type: object
      properties:
        first:
          type: string
        second:
          type: integer
  - name: tags
    in: query
    schema:
      type: array
      items:
        type: string
"#;

fn draft() -> (Operation, NodeId, NodeId, NodeId) {
    let mut op = Template::from_yaml_str(DESCRIPTOR).unwrap().to_draft();
    let array = op.find_by_name("anArray")[0];
    let object = op.find_by_name("anObject")[0];
    let tags = op.find_by_name("tags")[0];
    op.set_value_tree(array, &json!(["val0", "val1", "val2"])).unwrap();
    op.set_value_tree(object, &json!({"first": "test", "second": 12}))
        .unwrap();
    op.set_value_tree(tags, &json!(["a", "b"])).unwrap();
    (op, array, object, tags)
}

#[test]
fn test_object_renderings() {
    let (op, _, object, _) = draft();
    let cases = [
        (ParameterStyle::Form, true, "first=test&second=12"),
        (ParameterStyle::Form, false, "anObject=first,test,second,12"),
        (ParameterStyle::Matrix, true, ";first=test;second=12"),
        (ParameterStyle::Matrix, false, ";anObject=first,test,second,12"),
        (ParameterStyle::Label, true, ".first=test.second=12"),
        (ParameterStyle::Label, false, ".first.test.second.12"),
        (ParameterStyle::Simple, true, "first=test,second=12"),
        (ParameterStyle::Simple, false, "first,test,second,12"),
        (
            ParameterStyle::DeepObject,
            true,
            "anObject[first]=test&anObject[second]=12",
        ),
    ];
    for (style, explode, expected) in cases {
        assert_eq!(
            render(&op, object, style, explode),
            expected,
            "{:?} explode={}",
            style,
            explode
        );
    }
}

#[test]
fn test_array_renderings() {
    let (op, array, _, _) = draft();
    assert_eq!(render(&op, array, ParameterStyle::Simple, false), "val0,val1,val2");
    assert_eq!(render(&op, array, ParameterStyle::Simple, true), "val0,val1,val2");
    assert_eq!(
        render(&op, array, ParameterStyle::Form, true),
        "anArray=val0&anArray=val1&anArray=val2"
    );
    assert_eq!(render(&op, array, ParameterStyle::Form, false), "anArray=val0,val1,val2");
    assert_eq!(render(&op, array, ParameterStyle::Label, true), ".val0.val1.val2");
    assert_eq!(render(&op, array, ParameterStyle::PipeDelimited, false), "val0|val1|val2");
}

#[test]
fn test_declared_and_default_styles() {
    let (op, array, object, tags) = draft();
    // path parameters default to simple, queries to exploded form
    assert_eq!(render_declared(&op, array), "val0,val1,val2");
    assert_eq!(render_declared(&op, tags), "tags=a&tags=b");
    assert_eq!(
        render_declared(&op, object),
        "anObject[first]=test&anObject[second]=12"
    );
}

#[test]
fn test_rendering_follows_element_edits() {
    let (mut op, array, _, _) = draft();
    op.move_element(array, 2, 0).unwrap();
    op.remove_element(array, 1).unwrap();
    assert_eq!(render(&op, array, ParameterStyle::Simple, false), "val2,val1");

    op.clear_elements(array).unwrap();
    assert_eq!(render(&op, array, ParameterStyle::Simple, false), "");
}
