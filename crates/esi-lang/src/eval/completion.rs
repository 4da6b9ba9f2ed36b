use super::runtime_value::RuntimeValue;
use crate::Ident;

/// How a statement finished.
///
/// Statement evaluation returns `Result<Completion, EvalError>`: the error
/// side carries thrown values, the `Ok` side carries every structured exit.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal(RuntimeValue),
    Break(Option<Ident>),
    Continue(Option<Ident>),
    Return(RuntimeValue),
}

impl Default for Completion {
    fn default() -> Self {
        Completion::Normal(RuntimeValue::Undefined)
    }
}

impl Completion {
    pub const EMPTY: Completion = Completion::Normal(RuntimeValue::Undefined);

    #[inline(always)]
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }

    /// Decides what a loop does with its body's completion: `None` keeps
    /// iterating, `Some` leaves the loop with the given completion.
    pub fn exit_loop(self, labels: &[Ident]) -> Option<Completion> {
        match self {
            Completion::Normal(_) => None,
            Completion::Continue(None) => None,
            Completion::Continue(Some(label)) if labels.contains(&label) => None,
            Completion::Break(None) => Some(Completion::EMPTY),
            Completion::Break(Some(label)) if labels.contains(&label) => Some(Completion::EMPTY),
            abrupt => Some(abrupt),
        }
    }
}
