use fail::FailScenario;

/// Fail point configuration scoped to a test.
///
/// Every configured fail point is turned off again when the scenario is dropped.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<(String, String)>,
}

impl<'a> CustomFailScenario<'a> {
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();
        let failpoints = failpoints
            .iter()
            .map(|(name, action)| (name.to_string(), action.to_string()))
            .collect::<Vec<_>>();

        for (name, action) in failpoints.iter() {
            fail::cfg(name, action).unwrap()
        }

        Self {
            _scenario: scenario,
            failpoints,
        }
    }

    /// Turns off a single fail point before the scenario ends.
    pub fn disable(&self, name: &str) {
        fail::cfg(name, "off").unwrap()
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for (name, _) in self.failpoints.iter() {
            fail::cfg(name, "off").unwrap()
        }
    }
}
