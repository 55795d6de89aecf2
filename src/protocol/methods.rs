//! Method registry: symbolic names <-> (component, command).
//!
//! Commands (request/result/error frames) and notifications (message
//! frames) live in separate namespaces, since the same command number
//! means different things in each.
//!
//! # Example
//!
//! ```
//! use blaze_client::protocol::{FrameType, MethodRegistry};
//!
//! let registry = MethodRegistry::builtin();
//! let (component, command) = registry.resolve("Game.leaveGame").unwrap();
//! assert_eq!(
//!     registry.name_for(component, command, FrameType::Result),
//!     "Game.leaveGame"
//! );
//! assert_eq!(registry.name_for(999, 1, FrameType::Result), "999.1");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::wire_format::FrameType;
use crate::error::{BlazeError, Result};

/// Which namespace a method lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Command,
    Notification,
}

impl MethodKind {
    /// Message frames are notifications; everything else is a command.
    pub fn for_frame(frame_type: FrameType) -> Self {
        match frame_type {
            FrameType::Message => MethodKind::Notification,
            _ => MethodKind::Command,
        }
    }
}

type MethodKey = (MethodKind, u16, u16);

/// Immutable bidirectional method table.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    by_name: HashMap<String, MethodKey>,
    by_id: HashMap<MethodKey, String>,
}

impl MethodRegistry {
    /// Start an empty registry.
    pub fn builder() -> MethodRegistryBuilder {
        MethodRegistryBuilder::default()
    }

    /// The built-in table, constructed once and shared.
    pub fn builtin() -> Arc<MethodRegistry> {
        static BUILTIN: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                let mut builder = MethodRegistry::builder();
                for &(name, component, command) in BUILTIN_COMMANDS {
                    builder = builder.command(name, component, command);
                }
                for &(name, component, command) in BUILTIN_NOTIFICATIONS {
                    builder = builder.notification(name, component, command);
                }
                Arc::new(builder.build())
            })
            .clone()
    }

    /// Resolve a method name to `(component, command)`.
    ///
    /// Accepts registered names and numeric `"component.command"` pairs.
    pub fn resolve(&self, name: &str) -> Result<(u16, u16)> {
        if let Some(&(_, component, command)) = self.by_name.get(name) {
            return Ok((component, command));
        }
        parse_numeric(name).ok_or_else(|| BlazeError::UnknownMethod(name.to_string()))
    }

    /// Namespace of a registered method.
    pub fn kind_of(&self, name: &str) -> Option<MethodKind> {
        self.by_name.get(name).map(|&(kind, _, _)| kind)
    }

    /// Name for a received frame, falling back to `"component.command"`.
    pub fn name_for(&self, component: u16, command: u16, frame_type: FrameType) -> String {
        let key = (MethodKind::for_frame(frame_type), component, command);
        match self.by_id.get(&key) {
            Some(name) => name.clone(),
            None => format!("{}.{}", component, command),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn parse_numeric(name: &str) -> Option<(u16, u16)> {
    let (component, command) = name.split_once('.')?;
    Some((component.parse().ok()?, command.parse().ok()?))
}

/// Builder for custom registries.
#[derive(Debug, Default)]
pub struct MethodRegistryBuilder {
    registry: MethodRegistry,
}

impl MethodRegistryBuilder {
    /// Register a command. Later registrations win.
    pub fn command(self, name: &str, component: u16, command: u16) -> Self {
        self.insert(name, (MethodKind::Command, component, command))
    }

    /// Register a notification. Later registrations win.
    pub fn notification(self, name: &str, component: u16, command: u16) -> Self {
        self.insert(name, (MethodKind::Notification, component, command))
    }

    fn insert(mut self, name: &str, key: MethodKey) -> Self {
        if let Some(old_key) = self.registry.by_name.insert(name.to_string(), key) {
            self.registry.by_id.remove(&old_key);
        }
        if let Some(old_name) = self.registry.by_id.insert(key, name.to_string()) {
            if old_name != name {
                self.registry.by_name.remove(&old_name);
            }
        }
        self
    }

    pub fn build(self) -> MethodRegistry {
        self.registry
    }
}

pub mod component {
    pub const AUTHENTICATION: u16 = 0x0001;
    pub const GAME: u16 = 0x0004;
    pub const REDIRECTOR: u16 = 0x0005;
    pub const STATS: u16 = 0x0007;
    pub const UTIL: u16 = 0x0009;
    pub const USER_SESSIONS: u16 = 0x7802;
}

use component::*;

const BUILTIN_COMMANDS: &[(&str, u16, u16)] = &[
    ("Authentication.createAccount", AUTHENTICATION, 0x0A),
    ("Authentication.updateAccount", AUTHENTICATION, 0x14),
    ("Authentication.listUserEntitlements2", AUTHENTICATION, 0x1D),
    ("Authentication.getAccount", AUTHENTICATION, 0x1E),
    ("Authentication.grantEntitlement", AUTHENTICATION, 0x1F),
    ("Authentication.listEntitlements", AUTHENTICATION, 0x20),
    ("Authentication.hasEntitlement", AUTHENTICATION, 0x21),
    ("Authentication.getAuthToken", AUTHENTICATION, 0x24),
    ("Authentication.getHandoffToken", AUTHENTICATION, 0x25),
    ("Authentication.login", AUTHENTICATION, 0x28),
    ("Authentication.acceptTos", AUTHENTICATION, 0x29),
    ("Authentication.getTosInfo", AUTHENTICATION, 0x2A),
    ("Authentication.silentLogin", AUTHENTICATION, 0x32),
    ("Authentication.expressLogin", AUTHENTICATION, 0x3C),
    ("Authentication.logout", AUTHENTICATION, 0x46),
    ("Authentication.getPersona", AUTHENTICATION, 0x5A),
    ("Authentication.loginPersona", AUTHENTICATION, 0x6E),
    ("Authentication.logoutPersona", AUTHENTICATION, 0x78),
    ("Authentication.originLogin", AUTHENTICATION, 0x98),
    ("Game.createGame", GAME, 0x01),
    ("Game.destroyGame", GAME, 0x02),
    ("Game.advanceGameState", GAME, 0x03),
    ("Game.setGameSettings", GAME, 0x04),
    ("Game.setPlayerCapacity", GAME, 0x05),
    ("Game.setGameAttributes", GAME, 0x07),
    ("Game.setPlayerAttributes", GAME, 0x08),
    ("Game.joinGame", GAME, 0x09),
    ("Game.removePlayer", GAME, 0x0B),
    ("Game.startMatchmaking", GAME, 0x10),
    ("Game.cancelMatchmaking", GAME, 0x11),
    ("Game.finalizeGameCreation", GAME, 0x12),
    ("Game.listGames", GAME, 0x14),
    ("Game.joinGameByGroup", GAME, 0x18),
    ("Game.leaveGame", GAME, 0x19),
    ("Game.migrateGame", GAME, 0x1A),
    ("Game.banPlayer", GAME, 0x20),
    ("Game.removePlayerFromBannedList", GAME, 0x24),
    ("Game.clearBannedList", GAME, 0x25),
    ("Game.getBannedList", GAME, 0x26),
    ("Game.addQueuedPlayerToGame", GAME, 0x29),
    ("Game.updateGameName", GAME, 0x2A),
    ("Game.reserveSlot", GAME, 0x2C),
    ("Game.getGameListSnapshot", GAME, 0x64),
    ("Game.getGameListSubscription", GAME, 0x65),
    ("Game.destroyGameList", GAME, 0x66),
    ("Game.getFullGameData", GAME, 0x67),
    ("Game.getMatchmakingConfig", GAME, 0x68),
    ("Game.getGameDataFromId", GAME, 0x69),
    ("Game.addAdminPlayer", GAME, 0x6A),
    ("Game.removeAdminPlayer", GAME, 0x6B),
    ("Game.setPlayerTeam", GAME, 0x6C),
    ("Game.changeGameTeamId", GAME, 0x6D),
    ("Game.swapPlayersTeam", GAME, 0x70),
    ("Redirector.getServerInstance", REDIRECTOR, 0x01),
    ("Stats.getStatDescs", STATS, 0x01),
    ("Stats.getStats", STATS, 0x02),
    ("Stats.getStatGroupList", STATS, 0x03),
    ("Stats.getStatGroup", STATS, 0x04),
    ("Stats.getStatsByGroup", STATS, 0x05),
    ("Stats.getDateRange", STATS, 0x06),
    ("Stats.getEntityCount", STATS, 0x07),
    ("Stats.getLeaderboardGroup", STATS, 0x0A),
    ("Stats.getLeaderboardFolderGroup", STATS, 0x0B),
    ("Stats.getLeaderboard", STATS, 0x0C),
    ("Stats.getCenteredLeaderboard", STATS, 0x0D),
    ("Stats.getFilteredLeaderboard", STATS, 0x0E),
    ("Stats.getKeyScopesMap", STATS, 0x0F),
    ("Stats.getStatsByGroupAsync", STATS, 0x10),
    ("Util.fetchClientConfig", UTIL, 0x01),
    ("Util.ping", UTIL, 0x02),
    ("Util.setClientData", UTIL, 0x03),
    ("Util.localizeStrings", UTIL, 0x04),
    ("Util.getTelemetryServer", UTIL, 0x05),
    ("Util.getTickerServer", UTIL, 0x06),
    ("Util.preAuth", UTIL, 0x07),
    ("Util.postAuth", UTIL, 0x08),
    ("Util.userSettingsLoad", UTIL, 0x0A),
    ("Util.userSettingsSave", UTIL, 0x0B),
    ("Util.userSettingsLoadAll", UTIL, 0x0C),
    ("Util.filterForProfanity", UTIL, 0x14),
    ("Util.fetchQosConfig", UTIL, 0x15),
    ("Util.setClientMetrics", UTIL, 0x16),
    ("Util.setConnectionState", UTIL, 0x17),
    ("Util.getUserOptions", UTIL, 0x19),
    ("Util.setUserOptions", UTIL, 0x1A),
    ("Util.suspendUserPing", UTIL, 0x1B),
    ("UserSessions.updateHardwareFlags", USER_SESSIONS, 0x08),
    ("UserSessions.lookupUser", USER_SESSIONS, 0x0C),
    ("UserSessions.lookupUsers", USER_SESSIONS, 0x0D),
    ("UserSessions.lookupUsersByPrefix", USER_SESSIONS, 0x0E),
    ("UserSessions.updateNetworkInfo", USER_SESSIONS, 0x14),
    ("UserSessions.lookupUserGeoIpData", USER_SESSIONS, 0x17),
    ("UserSessions.updateUserSessionClientData", USER_SESSIONS, 0x19),
    ("UserSessions.setUserInfoAttribute", USER_SESSIONS, 0x1A),
    ("UserSessions.lookupUserSessionId", USER_SESSIONS, 0x20),
    ("UserSessions.resumeSession", USER_SESSIONS, 0x23),
];

const BUILTIN_NOTIFICATIONS: &[(&str, u16, u16)] = &[
    ("Game.notifyMatchmakingFailed", GAME, 0x0A),
    ("Game.notifyMatchmakingAsyncStatus", GAME, 0x0C),
    ("Game.notifyGameCreated", GAME, 0x0F),
    ("Game.notifyGameRemoved", GAME, 0x10),
    ("Game.notifyGameSetup", GAME, 0x14),
    ("Game.notifyPlayerJoining", GAME, 0x15),
    ("Game.notifyPlayerJoinCompleted", GAME, 0x1E),
    ("Game.notifyPlayerRemoved", GAME, 0x28),
    ("Game.notifyHostMigrationFinished", GAME, 0x3C),
    ("Game.notifyHostMigrationStart", GAME, 0x46),
    ("Game.notifyPlatformHostInitialized", GAME, 0x47),
    ("Game.notifyGameAttribChange", GAME, 0x50),
    ("Game.notifyPlayerAttribChange", GAME, 0x5A),
    ("Game.notifyPlayerCustomDataChange", GAME, 0x5F),
    ("Game.notifyGameStateChange", GAME, 0x64),
    ("Game.notifyGameSettingsChange", GAME, 0x6E),
    ("Game.notifyGameCapacityChange", GAME, 0x6F),
    ("Game.notifyGameReset", GAME, 0x70),
    ("Game.notifyGameReportingIdChange", GAME, 0x71),
    ("Game.notifyGameSessionUpdated", GAME, 0x73),
    ("Game.notifyGamePlayerStateChange", GAME, 0x74),
    ("Game.notifyGamePlayerTeamChange", GAME, 0x75),
    ("Game.notifyGameTeamIdChange", GAME, 0x76),
    ("Game.notifyAdminListChange", GAME, 0xC9),
    ("Game.notifyGameListUpdate", GAME, 0xCA),
    ("Stats.notifyUpdateCacheStats", STATS, 0x32),
    ("Stats.notifyGetStatsAsync", STATS, 0x33),
    ("Util.notifyUserOptionsChanged", UTIL, 0x05),
    ("UserSessions.userSessionExtendedDataUpdate", USER_SESSIONS, 0x01),
    ("UserSessions.userAdded", USER_SESSIONS, 0x02),
    ("UserSessions.userRemoved", USER_SESSIONS, 0x03),
    ("UserSessions.userSessionDisconnected", USER_SESSIONS, 0x04),
    ("UserSessions.userUpdated", USER_SESSIONS, 0x05),
    ("UserSessions.userAuthenticated", USER_SESSIONS, 0x08),
    ("UserSessions.userUnauthenticated", USER_SESSIONS, 0x09),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_bidirectional() {
        let registry = MethodRegistry::builtin();
        for &(name, component, command) in BUILTIN_COMMANDS {
            assert_eq!(registry.resolve(name).unwrap(), (component, command));
            assert_eq!(registry.name_for(component, command, FrameType::Command), name);
            assert_eq!(registry.name_for(component, command, FrameType::Result), name);
            assert_eq!(registry.name_for(component, command, FrameType::Error), name);
        }
        for &(name, component, command) in BUILTIN_NOTIFICATIONS {
            assert_eq!(registry.resolve(name).unwrap(), (component, command));
            assert_eq!(registry.name_for(component, command, FrameType::Message), name);
            assert_eq!(registry.kind_of(name), Some(MethodKind::Notification));
        }
        assert_eq!(
            registry.len(),
            BUILTIN_COMMANDS.len() + BUILTIN_NOTIFICATIONS.len()
        );
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = MethodRegistry::builtin();
        let b = MethodRegistry::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let registry = MethodRegistry::builtin();
        // Same numbers, different meaning per namespace
        assert_eq!(registry.name_for(GAME, 0x10, FrameType::Result), "Game.startMatchmaking");
        assert_eq!(registry.name_for(GAME, 0x10, FrameType::Message), "Game.notifyGameRemoved");
    }

    #[test]
    fn test_unmapped_falls_back_to_decimal() {
        let registry = MethodRegistry::builtin();
        assert_eq!(registry.name_for(0x0815, 0x21, FrameType::Result), "2069.33");
        assert_eq!(registry.name_for(GAME, 0x0B, FrameType::Message), "4.11");
    }

    #[test]
    fn test_resolve_numeric_names() {
        let registry = MethodRegistry::builtin();
        assert_eq!(registry.resolve("2069.33").unwrap(), (2069, 33));
        assert!(matches!(
            registry.resolve("Game.doesNotExist"),
            Err(BlazeError::UnknownMethod(_))
        ));
        assert!(registry.resolve("70000.1").is_err());
        assert!(registry.resolve("nodot").is_err());
    }

    #[test]
    fn test_custom_registry_overrides() {
        let registry = MethodRegistry::builder()
            .command("Test.old", 1, 1)
            .command("Test.new", 1, 1)
            .notification("Test.note", 1, 1)
            .build();

        assert!(registry.resolve("Test.old").is_err());
        assert_eq!(registry.resolve("Test.new").unwrap(), (1, 1));
        assert_eq!(registry.name_for(1, 1, FrameType::Result), "Test.new");
        assert_eq!(registry.name_for(1, 1, FrameType::Message), "Test.note");
        assert_eq!(registry.len(), 2);
    }
}
