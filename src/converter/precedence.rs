use crate::domain::state::StateKind;

/// Ranks state kinds when a protocol key can be presented in more than one acceptable kind.
///
/// The first kind in the order is the most specific. Kinds absent from the order share the
/// lowest rank.
#[derive(Clone, PartialEq, Debug)]
pub struct KindPrecedence {
    order: Vec<StateKind>,
}

impl KindPrecedence {
    pub fn new(order: Vec<StateKind>) -> Self {
        let mut deduplicated = Vec::with_capacity(order.len());
        for kind in order {
            if !deduplicated.contains(&kind) {
                deduplicated.push(kind);
            }
        }
        KindPrecedence { order: deduplicated }
    }

    pub fn rank(&self, kind: StateKind) -> usize {
        self.order.iter().position(|k| *k == kind).map_or(0, |position| self.order.len() - position)
    }

    pub fn order(&self) -> &[StateKind] {
        &self.order
    }
}

impl Default for KindPrecedence {
    /// Numeric kinds first, then the specific non-numeric kinds, then plain strings.
    fn default() -> Self {
        KindPrecedence::new(vec![
            StateKind::Decimal,
            StateKind::Percent,
            StateKind::DateTime,
            StateKind::OnOff,
            StateKind::OpenClosed,
            StateKind::String,
        ])
    }
}
