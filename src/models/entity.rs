// src/models/entity.rs
use serde::Serialize;
use serde_json::{json, Map, Value};
use crate::models::entry::ServerIdentity;
use crate::models::snapshot::ServerSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    PlayersOnline,
    PlayersMax,
    Motd,
    Version,
    Latency,
    PlayerList,
    Online,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        Self::PlayersOnline,
        Self::PlayersMax,
        Self::Motd,
        Self::Version,
        Self::Latency,
        Self::PlayerList,
        Self::Online,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::PlayersOnline => "players_online",
            Self::PlayersMax => "players_max",
            Self::Motd => "motd",
            Self::Version => "version",
            Self::Latency => "latency",
            Self::PlayerList => "player_list",
            Self::Online => "online",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::PlayersOnline => "Players Online",
            Self::PlayersMax => "Max Players",
            Self::Motd => "MOTD",
            Self::Version => "Version",
            Self::Latency => "Latency",
            Self::PlayerList => "Player List",
            Self::Online => "Status",
        }
    }

    fn icon(self) -> Option<&'static str> {
        match self {
            Self::PlayersOnline => Some("mdi:account-group"),
            Self::PlayersMax => Some("mdi:account-group-outline"),
            Self::Motd => Some("mdi:message-text"),
            Self::Version => Some("mdi:information-outline"),
            Self::Latency => Some("mdi:timer-outline"),
            Self::PlayerList => Some("mdi:format-list-bulleted"),
            Self::Online => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub platform: &'static str,
    pub kind: EntityKind,
    pub name: String,
    pub icon: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
    pub state: Value,
    pub attributes: Map<String, Value>,
}

pub fn device_info(identity: &ServerIdentity, server_name: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        identifiers: identity.unique_id(),
        name: server_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Minecraft Server {}", identity)),
        manufacturer: "Mojang",
        model: "Minecraft Java Server",
    }
}

fn non_empty(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

/// Renders one snapshot as an entity state.
pub fn render(
    kind: EntityKind,
    identity: &ServerIdentity,
    server_name: Option<&str>,
    snapshot: &ServerSnapshot,
) -> EntityState {
    let display = server_name
        .map(str::to_string)
        .unwrap_or_else(|| identity.to_string());

    let mut attributes = Map::new();
    let state = match kind {
        EntityKind::PlayersOnline => {
            attributes.insert("max_players".into(), json!(snapshot.players_max));
            json!(snapshot.players_online)
        }
        EntityKind::PlayersMax => json!(snapshot.players_max),
        EntityKind::Motd => non_empty(&snapshot.motd),
        EntityKind::Version => non_empty(&snapshot.version),
        EntityKind::Latency => json!(snapshot.latency_ms),
        EntityKind::PlayerList => {
            attributes.insert("player_names".into(), json!(snapshot.player_names));
            json!(snapshot.player_names.len())
        }
        EntityKind::Online => json!(snapshot.online),
    };

    let measurement = matches!(kind, EntityKind::PlayersOnline | EntityKind::Latency);

    EntityState {
        unique_id: format!("{}_{}_{}", identity.host, identity.port, kind.key()),
        platform: if kind == EntityKind::Online { "binary_sensor" } else { "sensor" },
        kind,
        name: format!("{} {}", display, kind.suffix()),
        icon: kind.icon(),
        device_class: (kind == EntityKind::Online).then_some("connectivity"),
        state_class: measurement.then_some("measurement"),
        unit_of_measurement: (kind == EntityKind::Latency).then_some("ms"),
        state,
        attributes,
    }
}

pub fn render_all(identity: &ServerIdentity, server_name: Option<&str>, snapshot: &ServerSnapshot) -> Vec<EntityState> {
    EntityKind::ALL
        .iter()
        .map(|kind| render(*kind, identity, server_name, snapshot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online() -> ServerSnapshot {
        ServerSnapshot {
            online: true,
            players_online: 2,
            players_max: 20,
            motd: "Welcome".into(),
            version: "1.20.4".into(),
            latency_ms: 8.5,
            player_names: vec!["Alex".into(), "Steve".into()],
            ..ServerSnapshot::default()
        }
    }

    #[test]
    fn names_and_ids_follow_identity() {
        let identity = ServerIdentity::new("mc.local", 25566);
        let state = render(EntityKind::PlayersOnline, &identity, None, &online());
        assert_eq!(state.unique_id, "mc.local_25566_players_online");
        assert_eq!(state.name, "mc.local:25566 Players Online");
        assert_eq!(state.state, json!(2));
        assert_eq!(state.attributes["max_players"], json!(20));

        let named = render(EntityKind::Online, &identity, Some("Lobby"), &online());
        assert_eq!(named.name, "Lobby Status");
        assert_eq!(named.platform, "binary_sensor");
        assert_eq!(named.device_class, Some("connectivity"));
    }

    #[test]
    fn player_list_state_is_count() {
        let identity = ServerIdentity::new("h", 1);
        let state = render(EntityKind::PlayerList, &identity, None, &online());
        assert_eq!(state.state, json!(2));
        assert_eq!(state.attributes["player_names"], json!(["Alex", "Steve"]));
    }

    #[test]
    fn offline_text_sensors_are_null() {
        let identity = ServerIdentity::new("h", 1);
        let states = render_all(&identity, None, &ServerSnapshot::offline());
        assert_eq!(states.len(), 7);
        let motd = states.iter().find(|s| s.kind == EntityKind::Motd).unwrap();
        assert!(motd.state.is_null());
        let online = states.iter().find(|s| s.kind == EntityKind::Online).unwrap();
        assert_eq!(online.state, json!(false));
    }

    #[test]
    fn device_defaults_to_identity() {
        let device = device_info(&ServerIdentity::new("h", 25565), None);
        assert_eq!(device.name, "Minecraft Server h:25565");
        assert_eq!(device.identifiers, "h:25565");
    }
}
