use shared::domain::Weekday;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Selected,
    Unselected,
}

/// Weekday toggles used while composing a section. Selection order is kept
/// and becomes the stored `selected_days` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySelector {
    selected: Vec<Weekday>,
}

impl DaySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips `day` and returns its new state.
    pub fn toggle(&mut self, day: Weekday) -> DayState {
        if let Some(position) = self.selected.iter().position(|selected| *selected == day) {
            self.selected.remove(position);
            DayState::Unselected
        } else {
            self.selected.push(day);
            DayState::Selected
        }
    }

    pub fn reset(&mut self) {
        self.selected.clear();
    }

    pub fn state(&self, day: Weekday) -> DayState {
        if self.selected.contains(&day) {
            DayState::Selected
        } else {
            DayState::Unselected
        }
    }

    pub fn states(&self) -> [(Weekday, DayState); 7] {
        Weekday::ALL.map(|day| (day, self.state(day)))
    }

    pub fn selected(&self) -> &[Weekday] {
        &self.selected
    }

    pub fn joined(&self) -> String {
        self.selected
            .iter()
            .map(|day| day.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
