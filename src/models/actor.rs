/// The authenticated identity performing an operation. Passed explicitly
/// into every lifecycle call; the engine never reads ambient request state.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub is_staff: bool,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_staff: false,
        }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_staff: true,
        }
    }

    /// Staff can act on any booking; customers only on their own.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_staff || self.id == owner_id
    }
}
