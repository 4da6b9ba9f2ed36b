pub mod error;
pub mod node;

use error::AstError;
use node::Program;

/// Decodes a program from ESTree JSON text.
pub fn from_json(text: &str) -> Result<Program, AstError> {
    Ok(serde_json::from_str(text)?)
}

/// Decodes a program from an already parsed ESTree JSON value.
pub fn from_value(value: serde_json::Value) -> Result<Program, AstError> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{Position, Range};
    use node::{Expression, LiteralValue, Statement};
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_decode_with_locations() {
        let program = from_value(json!({
            "type": "Program",
            "body": [{
                "type": "ExpressionStatement",
                "expression": {
                    "type": "Literal",
                    "value": 1,
                    "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 1}}
                }
            }]
        }))
        .unwrap();

        let [Statement::ExpressionStatement(statement)] = program.body.as_slice() else {
            panic!("unexpected body {:?}", program.body);
        };
        let Expression::Literal(literal) = &statement.expression else {
            panic!("unexpected expression {:?}", statement.expression);
        };
        assert_eq!(literal.value, Some(LiteralValue::Number(1.0)));
        assert_eq!(
            literal.loc,
            Some(Range::new(Position::new(1, 0), Position::new(1, 1)))
        );
    }

    #[rstest]
    #[case::null(json!(null), None)]
    #[case::string(json!("s"), Some(LiteralValue::String("s".into())))]
    #[case::boolean(json!(false), Some(LiteralValue::Bool(false)))]
    #[case::regex_object(json!({}), Some(LiteralValue::Other(json!({}))))]
    fn test_decode_literal_values(#[case] value: serde_json::Value, #[case] expected: Option<LiteralValue>) {
        let program = from_value(json!({
            "type": "Program",
            "body": [{"type": "ExpressionStatement", "expression": {"type": "Literal", "value": value}}]
        }))
        .unwrap();
        match program.body.as_slice() {
            [Statement::ExpressionStatement(statement)] => match &statement.expression {
                Expression::Literal(literal) => assert_eq!(literal.value, expected),
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_kind_decodes() {
        let program = from_value(json!({
            "type": "Program",
            "body": [{"type": "ClassDeclaration", "id": {"type": "Identifier", "name": "A"}, "body": {}}]
        }))
        .unwrap();
        assert!(matches!(program.body[0], Statement::ClassDeclaration(_)));
    }

    #[rstest]
    #[case::unknown_type(r#"{"type":"Program","body":[{"type":"Nonsense"}]}"#)]
    #[case::missing_body(r#"{"type":"Program"}"#)]
    #[case::not_json("function f() {}")]
    fn test_decode_errors(#[case] input: &str) {
        assert!(matches!(from_json(input), Err(AstError::InvalidJson { .. })));
    }

    #[test]
    fn test_error_position() {
        let Err(AstError::InvalidJson { line, .. }) = from_json("{\n  \"body\": [,]\n}") else {
            panic!("expected a decode error");
        };
        assert_eq!(line, 2);
    }
}
