// src/protocol/response.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub name: String,
    #[serde(default)]
    pub protocol: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Players {
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub online: i64,
    pub sample: Option<Vec<PlayerSample>>,
}

/// FML2+ mod entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeMod {
    #[serde(rename = "modId")]
    pub mod_id: String,
    #[serde(default)]
    pub modmarker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeData {
    #[serde(default)]
    pub mods: Vec<ForgeMod>,
}

/// Pre-1.13 FML mod entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyMod {
    pub modid: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyModInfo {
    #[serde(rename = "modList", default)]
    pub mod_list: Vec<LegacyMod>,
}

/// JSON body of a Server List Ping status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: Option<Version>,
    pub players: Option<Players>,
    #[serde(default)]
    pub description: Value,
    #[serde(rename = "forgeData")]
    pub forge_data: Option<ForgeData>,
    pub modinfo: Option<LegacyModInfo>,
}

impl StatusResponse {
    /// Plain text of the description, which is either a string or a chat component tree.
    pub fn motd_plain(&self) -> String {
        let mut out = String::new();
        flatten_component(&self.description, &mut out);
        out
    }

    /// `(id, version)` pairs when the server advertises Forge, `None` for vanilla servers.
    pub fn mods(&self) -> Option<Vec<(String, String)>> {
        if let Some(forge) = &self.forge_data {
            return Some(
                forge.mods.iter().map(|m| (m.mod_id.clone(), m.modmarker.clone())).collect(),
            );
        }
        self.modinfo.as_ref().map(|info| {
            info.mod_list.iter().map(|m| (m.modid.clone(), m.version.clone())).collect()
        })
    }
}

fn flatten_component(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => items.iter().for_each(|item| flatten_component(item, out)),
        Value::Object(map) => {
            if let Some(text) = map.get("text") {
                flatten_component(text, out);
            }
            if let Some(extra) = map.get("extra") {
                flatten_component(extra, out);
            }
        }
        _ => {}
    }
}
