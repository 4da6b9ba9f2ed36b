use serde::{Deserialize, Serialize};

/// A line/column pair as emitted by ESTree parsers: 1-based line, 0-based column.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 0 }
    }
}

impl Position {
    pub fn new(line: u32, column: usize) -> Self {
        Position { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The `loc` of an ESTree node.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: &Position) -> bool {
        (self.start.line < position.line
            || (self.start.line == position.line && self.start.column <= position.column))
            && (self.end.line > position.line
                || (self.end.line == position.line && self.end.column >= position.column))
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Position::new(1, 0), true)]
    #[case(Position::new(2, 5), true)]
    #[case(Position::new(3, 4), true)]
    #[case(Position::new(3, 5), false)]
    #[case(Position::new(0, 9), false)]
    fn test_contains(#[case] position: Position, #[case] expected: bool) {
        let range = Range::new(Position::new(1, 0), Position::new(3, 4));
        assert_eq!(range.contains(&position), expected);
    }

    #[test]
    fn test_deserialize_estree_loc() {
        let range: Range = serde_json::from_str(
            r#"{"start":{"line":2,"column":4},"end":{"line":2,"column":9}}"#,
        )
        .unwrap();
        assert_eq!(range, Range::new(Position::new(2, 4), Position::new(2, 9)));
        assert_eq!(range.to_string(), "2:4");
    }
}
