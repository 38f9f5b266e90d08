use fieldguard_core::{
    Literal, Multiplicity, NestedValidation, TypeRef, ValidatableProperty, ValidatableType,
    ValidationAnnotation,
};

fn todo_type() -> ValidatableType {
    ValidatableType {
        element: TypeRef::named("Todo"),
        sequence: false,
        properties: vec![ValidatableProperty {
            name: "Id".to_string(),
            wire_name: "id".to_string(),
            accessor: vec!["id".to_string()],
            ty: TypeRef::named("i32"),
            annotations: vec![ValidationAnnotation::new(
                "range",
                vec![Literal::Int(1), Literal::Int(10)],
            )],
            nested: None,
            recursive: false,
        }],
        nested: false,
        recursive: false,
    }
}

#[test]
fn serializes_validatable_type_deterministically() {
    let json = serde_json::to_string_pretty(&todo_type()).expect("serialize type");
    let expected = r#"{
  "element": {
    "name": "Todo"
  },
  "sequence": false,
  "properties": [
    {
      "name": "Id",
      "wire_name": "id",
      "accessor": [
        "id"
      ],
      "ty": {
        "name": "i32"
      },
      "annotations": [
        {
          "kind": "range",
          "args": [
            {
              "kind": "int",
              "value": 1
            },
            {
              "kind": "int",
              "value": 10
            }
          ]
        }
      ],
      "recursive": false
    }
  ],
  "nested": false,
  "recursive": false
}"#;
    assert_eq!(json, expected);
}

#[test]
fn nested_property_round_trips() {
    let property = ValidatableProperty {
        name: "Items".to_string(),
        wire_name: "items".to_string(),
        accessor: vec!["items".to_string()],
        ty: TypeRef::generic("Vec", vec![TypeRef::named("Item")]),
        annotations: Vec::new(),
        nested: Some(NestedValidation {
            target: "Item".to_string(),
            multiplicity: Multiplicity::Sequence,
            optional: false,
        }),
        recursive: false,
    };
    let json = serde_json::to_string(&property).expect("serialize property");
    assert!(json.contains(r#""multiplicity":"sequence""#));
    let back: ValidatableProperty = serde_json::from_str(&json).expect("parse property");
    assert_eq!(back, property);
    assert!(back.is_other_validatable_type());
}
