//! Client configuration loaded from the environment.
//!
//! | Variable                      | Default                   |
//! |-------------------------------|---------------------------|
//! | `GRIDTALK_WS_URL`             | `ws://127.0.0.1:3001/ws`  |
//! | `GRIDTALK_ROLE`               | `player`                  |
//! | `GRIDTALK_TOKEN`              | required for `player`     |
//! | `GRIDTALK_USER_ID`            | required for `player`     |
//! | `GRIDTALK_DISPLAY_NAME`       | required for `player`     |
//! | `GRIDTALK_RECONNECT_DELAY_MS` | `2000`                    |

use std::str::FromStr;
use std::time::Duration;

use gridtalk_domain::UserId;
use thiserror::Error;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3001/ws";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2_000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Which connection role this client plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RoleKind {
    /// Controls an entity; requires credentials
    #[default]
    Player,
    /// Read-only view of the world; no credentials
    Observer,
}

impl FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player" => Ok(Self::Player),
            "observer" | "spectator" => Ok(Self::Observer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What the JOIN handshake carries.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinCredentials {
    pub token: String,
    pub user_id: UserId,
    pub display_name: String,
}

impl std::fmt::Debug for JoinCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinCredentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientRole {
    Player(JoinCredentials),
    Observer,
}

impl ClientRole {
    pub fn kind(&self) -> RoleKind {
        match self {
            ClientRole::Player(_) => RoleKind::Player,
            ClientRole::Observer => RoleKind::Observer,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ClientRole::Observer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub ws_url: Url,
    pub role: ClientRole,
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("GRIDTALK_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let ws_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            key: "GRIDTALK_WS_URL",
            reason: e.to_string(),
        })?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid {
                key: "GRIDTALK_WS_URL",
                reason: format!("expected ws:// or wss://, got {}://", ws_url.scheme()),
            });
        }

        let role_kind = match lookup("GRIDTALK_ROLE") {
            Some(raw) => raw.parse::<RoleKind>().map_err(|reason| ConfigError::Invalid {
                key: "GRIDTALK_ROLE",
                reason,
            })?,
            None => RoleKind::default(),
        };

        let role = match role_kind {
            RoleKind::Observer => ClientRole::Observer,
            RoleKind::Player => {
                let required = |key: &'static str| {
                    lookup(key)
                        .filter(|v| !v.trim().is_empty())
                        .ok_or(ConfigError::Missing(key))
                };
                ClientRole::Player(JoinCredentials {
                    token: required("GRIDTALK_TOKEN")?,
                    user_id: UserId::new(required("GRIDTALK_USER_ID")?),
                    display_name: required("GRIDTALK_DISPLAY_NAME")?,
                })
            }
        };

        let reconnect_delay = match lookup("GRIDTALK_RECONNECT_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    key: "GRIDTALK_RECONNECT_DELAY_MS",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_RECONNECT_DELAY,
        };

        Ok(Self {
            ws_url,
            role,
            reconnect_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn player_role_requires_credentials() {
        let result = ClientConfig::from_lookup(lookup(&[("GRIDTALK_TOKEN", "t")]));
        assert_eq!(result, Err(ConfigError::Missing("GRIDTALK_USER_ID")));
    }

    #[test]
    fn player_config_with_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GRIDTALK_TOKEN", "t"),
            ("GRIDTALK_USER_ID", "u1"),
            ("GRIDTALK_DISPLAY_NAME", "Ada"),
        ]))
        .expect("config");

        assert_eq!(config.ws_url.as_str(), DEFAULT_WS_URL);
        assert_eq!(config.reconnect_delay, Duration::from_millis(2_000));
        assert_eq!(config.role.kind(), RoleKind::Player);
    }

    #[test]
    fn observer_needs_no_credentials() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GRIDTALK_ROLE", "Observer"),
            ("GRIDTALK_RECONNECT_DELAY_MS", "500"),
        ]))
        .expect("config");

        assert!(config.role.is_read_only());
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
    }

    #[test]
    fn rejects_non_websocket_url() {
        let result = ClientConfig::from_lookup(lookup(&[
            ("GRIDTALK_ROLE", "observer"),
            ("GRIDTALK_WS_URL", "http://localhost/ws"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "GRIDTALK_WS_URL",
                ..
            })
        ));
    }

    #[test]
    fn credentials_debug_hides_token() {
        let creds = JoinCredentials {
            token: "hunter2".into(),
            user_id: UserId::new("u"),
            display_name: "n".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
