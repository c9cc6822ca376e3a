//! Prediction scenarios for the simulator.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: start → goal → start with light sensor noise
    Walk,

    /// SIM-002: start → goal → far corner → start
    RoundTrip,

    /// SIM-003: the human leaves the monitored area and comes back
    Excursion,

    /// SIM-004: every third inference call fails
    FlakyPlanner,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Walk,
            ScenarioId::RoundTrip,
            ScenarioId::Excursion,
            ScenarioId::FlakyPlanner,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Walk => "walk",
            ScenarioId::RoundTrip => "round_trip",
            ScenarioId::Excursion => "excursion",
            ScenarioId::FlakyPlanner => "flaky_planner",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Walk => "Human walks to the goal and back, forecasts track every update",
            ScenarioId::RoundTrip => "Multi-waypoint route, forecast stays anchored on the observed cell",
            ScenarioId::Excursion => "Human steps outside the grid, stale forecast kept until re-entry",
            ScenarioId::FlakyPlanner => "Injected inference failures never clear the stored forecast",
        }
    }

    /// Returns true if the scenario drives the node through failures.
    pub fn injects_faults(&self) -> bool {
        matches!(self, ScenarioId::Excursion | ScenarioId::FlakyPlanner)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "walk" | "sim-001" => Ok(ScenarioId::Walk),
            "round_trip" | "roundtrip" | "sim-002" => Ok(ScenarioId::RoundTrip),
            "excursion" | "sim-003" => Ok(ScenarioId::Excursion),
            "flaky_planner" | "flakyplanner" | "flaky" | "sim-004" => Ok(ScenarioId::FlakyPlanner),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
