use graphport_common::Config;

/// Where interactive answers come from. The CLI prompts a human; tests script it.
pub trait DecisionSource: Send + Sync {
    /// Ask a yes/no question. `false` means stop.
    fn confirm(&self, prompt: &str) -> bool;

    /// Ask for a value, falling back to `default` when nothing is given.
    fn read_value(&self, name: &str, default: &str) -> String;
}

/// Answers yes to everything and accepts every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

impl DecisionSource for AlwaysContinue {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }

    fn read_value(&self, _name: &str, default: &str) -> String {
        default.to_string()
    }
}

/// Let the operator override source credentials and the export directory,
/// each defaulting to the configured value.
pub fn prompt_connection_settings(config: &mut Config, decisions: &dyn DecisionSource) {
    config.neo4j_uri = decisions.read_value("Neo4j URI", &config.neo4j_uri);
    config.neo4j_user = decisions.read_value("Neo4j username", &config.neo4j_user);
    config.neo4j_password = decisions.read_value("Neo4j password", &config.neo4j_password);
    let export_dir = config.export_dir.display().to_string();
    config.export_dir = decisions.read_value("Export directory", &export_dir).into();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDecisions;

    #[test]
    fn defaults_survive_when_nothing_is_entered() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        let before = config.clone();
        prompt_connection_settings(&mut config, &AlwaysContinue);
        assert_eq!(config.neo4j_uri, before.neo4j_uri);
        assert_eq!(config.export_dir, before.export_dir);
    }

    #[test]
    fn entered_values_override_config() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        let decisions = ScriptedDecisions::new()
            .with_value("Neo4j URI", "bolt://db:7687")
            .with_value("Export directory", "/srv/export");
        prompt_connection_settings(&mut config, &decisions);
        assert_eq!(config.neo4j_uri, "bolt://db:7687");
        assert_eq!(config.export_dir, std::path::PathBuf::from("/srv/export"));
        assert_eq!(config.neo4j_user, "neo4j");
    }
}
