// src/models/snapshot.rs
use serde::{Deserialize, Serialize};
use crate::protocol::response::StatusResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    pub id: String,
    pub version: String,
}

/// Status of one server at the last poll. The default value is the offline snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub online: bool,
    pub players_online: i64,
    pub players_max: i64,
    pub motd: String,
    pub version: String,
    pub latency_ms: f64,
    pub player_names: Vec<String>,
    pub modded: bool,
    pub mod_count: usize,
    pub mod_list: Vec<ModInfo>,
}

impl ServerSnapshot {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn from_status(status: &StatusResponse, latency_ms: f64) -> Self {
        let players = status.players.as_ref();
        let player_names = players
            .and_then(|p| p.sample.as_ref())
            .map(|sample| sample.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default();

        let mods = status.mods();
        let mod_list: Vec<ModInfo> = mods
            .as_ref()
            .map(|list| {
                list.iter()
                    .map(|(id, version)| ModInfo { id: id.clone(), version: version.clone() })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            online: true,
            players_online: players.map(|p| p.online).unwrap_or(0),
            players_max: players.map(|p| p.max).unwrap_or(0),
            motd: strip_formatting(&status.motd_plain()),
            version: status
                .version
                .as_ref()
                .map(|v| v.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            latency_ms: (latency_ms * 100.0).round() / 100.0,
            player_names,
            modded: mods.is_some(),
            mod_count: mod_list.len(),
            mod_list,
        }
    }
}

/// Removes `§x` formatting codes.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{00a7}' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn offline_snapshot_is_zeroed() {
        let snapshot = ServerSnapshot::offline();
        assert!(!snapshot.online);
        assert_eq!(snapshot.players_online, 0);
        assert_eq!(snapshot.players_max, 0);
        assert_eq!(snapshot.latency_ms, 0.0);
        assert!(snapshot.motd.is_empty());
        assert!(snapshot.version.is_empty());
        assert!(snapshot.player_names.is_empty());
        assert!(!snapshot.modded);
        assert_eq!(snapshot.mod_count, 0);
        assert!(snapshot.mod_list.is_empty());
    }

    #[test]
    fn vanilla_status_populates_snapshot() {
        let status = parse(r#"{
            "version": {"name": "1.20.4", "protocol": 765},
            "players": {"max": 20, "online": 2, "sample": [
                {"name": "Alex", "id": "00000000-0000-0000-0000-000000000001"},
                {"name": "Steve", "id": "00000000-0000-0000-0000-000000000002"}
            ]},
            "description": {"text": "§aHello ", "extra": [{"text": "§lworld"}]}
        }"#);
        let snapshot = ServerSnapshot::from_status(&status, 12.3456);
        assert!(snapshot.online);
        assert_eq!(snapshot.players_online, 2);
        assert_eq!(snapshot.players_max, 20);
        assert_eq!(snapshot.version, "1.20.4");
        assert_eq!(snapshot.motd, "Hello world");
        assert_eq!(snapshot.latency_ms, 12.35);
        assert_eq!(snapshot.player_names, vec!["Alex", "Steve"]);
        assert!(!snapshot.modded);
    }

    #[test]
    fn forge_data_marks_server_modded() {
        let status = parse(r#"{
            "version": {"name": "1.20.1", "protocol": 763},
            "players": {"max": 10, "online": 0},
            "description": "Modded",
            "forgeData": {"fmlNetworkVersion": 3, "channels": [], "mods": [
                {"modId": "forge", "modmarker": "47.2.0"},
                {"modId": "create", "modmarker": "0.5.1"}
            ]}
        }"#);
        let snapshot = ServerSnapshot::from_status(&status, 3.0);
        assert!(snapshot.modded);
        assert_eq!(snapshot.mod_count, 2);
        assert_eq!(snapshot.mod_count, snapshot.mod_list.len());
        assert_eq!(snapshot.mod_list[1], ModInfo { id: "create".into(), version: "0.5.1".into() });
    }

    #[test]
    fn legacy_modinfo_is_accepted() {
        let status = parse(r#"{
            "version": {"name": "1.12.2", "protocol": 340},
            "description": "old",
            "modinfo": {"type": "FML", "modList": [{"modid": "mcp", "version": "9.42"}]}
        }"#);
        let snapshot = ServerSnapshot::from_status(&status, 1.0);
        assert!(snapshot.modded);
        assert_eq!(snapshot.mod_count, 1);
        assert_eq!(snapshot.players_max, 0);
    }

    #[test]
    fn missing_version_reads_unknown() {
        let status = parse(r#"{"description": ""}"#);
        assert_eq!(ServerSnapshot::from_status(&status, 0.0).version, "Unknown");
    }

    #[test]
    fn strip_formatting_handles_trailing_marker() {
        assert_eq!(strip_formatting("§6Gold§r text§"), "Gold text");
    }
}
