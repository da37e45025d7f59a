use crate::config::SessionConfig;
use crate::cookie::{CookieJar, SetCookie, chunk_by_bytes, reassemble};
use crate::crypto::Sealer;
use crate::errors::SessionError;
use crate::session::types::SessionData;

/// Reads, writes and clears the session fragment cookies.
///
/// This is the only component that touches the session cookies. Fragments are
/// named `prefix1..=prefixN` where N is the configured maximum.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: SessionConfig,
    sealer: Sealer,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let sealer = Sealer::new(&config.secret)?;
        Ok(Self { config, sealer })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current session, or `None` when there is none.
    ///
    /// Fragments are read in index order up to the first missing one. A
    /// fragment set that fails to open or carries another version reads as
    /// `None` and is left in place.
    #[tracing::instrument(skip_all)]
    pub fn read<J: CookieJar + ?Sized>(&self, jar: &J) -> Option<SessionData> {
        let mut fragments = Vec::new();
        for index in 1..=self.config.max_fragments {
            match jar.get(&self.config.fragment_name(index)) {
                Some(value) if !value.is_empty() => fragments.push(value),
                _ => break,
            }
        }

        if fragments.is_empty() {
            tracing::debug!("No session cookies found");
            return None;
        }

        let token = reassemble(&fragments);
        let session: SessionData = self.sealer.unseal(&token)?;
        if !session.is_current_version() {
            tracing::debug!("Ignoring session with version {}", session.v);
            return None;
        }

        tracing::debug!("Read session from {} fragments", fragments.len());
        Some(session)
    }

    /// Seals `session` and replaces the fragment cookies with it.
    ///
    /// The token is sealed and chunked before the jar is touched, so a
    /// capacity or serialization error leaves the existing cookies as they
    /// were. Returns the value as stored, with version and timestamp set.
    #[tracing::instrument(skip_all)]
    pub fn write<J: CookieJar + ?Sized>(
        &self,
        jar: &mut J,
        mut session: SessionData,
    ) -> Result<SessionData, SessionError> {
        session.touch();

        let token = self.sealer.seal(&session)?;
        let fragments = chunk_by_bytes(&token, self.config.max_fragment_bytes)?;
        if fragments.len() > self.config.max_fragments {
            tracing::error!(
                "Session needs {} fragments, limit is {}",
                fragments.len(),
                self.config.max_fragments
            );
            return Err(SessionError::Capacity {
                required: fragments.len(),
                max: self.config.max_fragments,
            });
        }

        self.clear(jar);
        for (offset, fragment) in fragments.iter().enumerate() {
            jar.set(self.fragment_cookie(offset + 1, fragment));
        }

        tracing::debug!(
            "Wrote session in {} fragments ({} bytes)",
            fragments.len(),
            token.len()
        );
        Ok(session)
    }

    /// Expires every fragment cookie currently present. Idempotent.
    #[tracing::instrument(skip_all)]
    pub fn clear<J: CookieJar + ?Sized>(&self, jar: &mut J) {
        let mut cleared = 0;
        for index in 1..=self.config.max_fragments {
            let name = self.config.fragment_name(index);
            if jar.get(&name).is_none() {
                continue;
            }
            jar.set(self.removal_cookie(name));
            cleared += 1;
        }
        if cleared > 0 {
            tracing::debug!("Cleared {} session fragments", cleared);
        }
    }

    fn fragment_cookie(&self, index: usize, value: &str) -> SetCookie {
        let name = self.config.fragment_name(index);
        let mut cookie = self.with_attributes(SetCookie::new(name, value));
        cookie.max_age = self
            .config
            .max_age
            .map(|age| i64::try_from(age).unwrap_or(i64::MAX));
        cookie
    }

    fn removal_cookie(&self, name: String) -> SetCookie {
        let mut cookie = self.with_attributes(SetCookie::new(name, ""));
        cookie.max_age = Some(0);
        cookie
    }

    fn with_attributes(&self, mut cookie: SetCookie) -> SetCookie {
        cookie.http_only = true;
        cookie.secure = self.config.secure;
        cookie.same_site = self.config.same_site;
        cookie.path = self.config.path.clone();
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SameSite, SessionSecret};
    use crate::cookie::RequestCookieJar;
    use crate::crypto::seal_json;
    use crate::session::types::{SessionUser, UpstreamCredentials};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn config() -> SessionConfig {
        SessionConfig::new(SessionSecret::new(SECRET).unwrap()).with_cookie_prefix("yt_s")
    }

    fn manager_with(config: SessionConfig) -> SessionManager {
        SessionManager::new(config).unwrap()
    }

    fn session_with_token(value: &str) -> SessionData {
        let mut creds = UpstreamCredentials::new();
        creds.insert("MUSIC_U", value);
        let mut session = SessionData::new();
        session.merge_credentials(creds);
        session
    }

    fn fragment_count(jar: &RequestCookieJar, prefix: &str) -> usize {
        (1..=10)
            .take_while(|i| jar.get(&format!("{prefix}{i}")).is_some())
            .count()
    }

    #[test]
    fn test_read_empty_jar_is_none() {
        let manager = manager_with(config());
        assert!(manager.read(&RequestCookieJar::new()).is_none());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        // Given a manager and a session with credentials and identity
        let manager = manager_with(config());
        let mut jar = RequestCookieJar::new();
        let session = session_with_token("abc123").with_user(SessionUser {
            user_id: 42,
            nickname: Some("yun".to_string()),
            avatar_url: Some("https://example.com/a.jpg".to_string()),
        });

        // When writing and reading back
        let stored = manager.write(&mut jar, session.clone()).unwrap();
        let read = manager.read(&jar).unwrap();

        // Then the stored value comes back with a timestamp
        assert_eq!(read, stored);
        assert!(read.updated_at.is_some());
        assert_eq!(read.upstream_credentials, session.upstream_credentials);
        assert_eq!(read.user, session.user);
    }

    #[test]
    fn test_write_sets_guarded_attributes() {
        let manager = manager_with(config().with_secure(false));
        let mut jar = RequestCookieJar::new();
        manager.write(&mut jar, SessionData::new()).unwrap();

        let cookie = &jar.pending()[0];
        assert_eq!(cookie.name, "yt_s1");
        assert!(cookie.http_only);
        assert!(!cookie.secure);
        assert_eq!(cookie.same_site, SameSite::Lax);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.max_age, None);
    }

    #[test]
    fn test_write_honors_max_age() {
        let manager = manager_with(config().with_max_age(Some(86_400)));
        let mut jar = RequestCookieJar::new();
        manager.write(&mut jar, SessionData::new()).unwrap();
        assert_eq!(jar.pending()[0].max_age, Some(86_400));
    }

    #[test]
    fn test_write_splits_into_fragments() {
        // Given a small fragment size
        let manager = manager_with(config().with_max_fragment_bytes(40));
        let mut jar = RequestCookieJar::new();

        // When writing a session
        manager
            .write(&mut jar, session_with_token("abc123"))
            .unwrap();

        // Then several fragments exist, each within the limit
        let count = fragment_count(&jar, "yt_s");
        assert!(count > 1);
        for cookie in jar.pending() {
            assert!(cookie.value.len() <= 40);
        }
        assert!(manager.read(&jar).is_some());
    }

    #[test]
    fn test_second_write_replaces_first_and_clears_stale_fragments() {
        // Given a large first session spread over several fragments
        let manager = manager_with(config().with_max_fragment_bytes(64));
        let mut jar = RequestCookieJar::new();
        manager
            .write(&mut jar, session_with_token(&"x".repeat(200)))
            .unwrap();
        let first_count = fragment_count(&jar, "yt_s");
        assert!(first_count >= 3);

        // When writing a smaller session
        let second = manager
            .write(&mut jar, session_with_token("small"))
            .unwrap();

        // Then only the new fragments remain and reading yields the new value
        let second_count = fragment_count(&jar, "yt_s");
        assert!(second_count < first_count);
        for index in second_count + 1..=first_count {
            assert!(jar.get(&format!("yt_s{index}")).is_none());
        }
        assert_eq!(manager.read(&jar), Some(second));
    }

    #[test]
    fn test_capacity_exceeded_fails_without_touching_jar() {
        // Given a limit of two tiny fragments
        let manager = manager_with(
            config()
                .with_max_fragment_bytes(16)
                .with_max_fragments(2),
        );
        let mut jar = RequestCookieJar::new();

        // When writing a session that needs more
        let result = manager.write(&mut jar, session_with_token("abc123"));

        // Then the write fails and nothing was recorded
        match result {
            Err(SessionError::Capacity { required, max }) => {
                assert!(required > 2);
                assert_eq!(max, 2);
            }
            other => panic!("Expected capacity error, got: {other:?}"),
        }
        assert!(jar.pending().is_empty());
    }

    #[test]
    fn test_capacity_error_keeps_previous_session() {
        let small = manager_with(config());
        let mut jar = RequestCookieJar::new();
        let stored = small.write(&mut jar, session_with_token("abc")).unwrap();

        let tight = manager_with(config().with_max_fragments(1));
        let result = tight.write(&mut jar, session_with_token(&"y".repeat(5000)));

        assert!(matches!(result, Err(SessionError::Capacity { .. })));
        assert_eq!(small.read(&jar), Some(stored));
    }

    #[test]
    fn test_clear_then_read_is_none() {
        let manager = manager_with(config());
        let mut jar = RequestCookieJar::new();
        manager.write(&mut jar, session_with_token("abc")).unwrap();

        manager.clear(&mut jar);

        assert!(manager.read(&jar).is_none());
        assert!(jar.pending().iter().all(SetCookie::is_removal));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let manager = manager_with(config());
        let mut jar = RequestCookieJar::new();

        // Clearing an empty jar records nothing
        manager.clear(&mut jar);
        assert!(jar.pending().is_empty());

        manager.write(&mut jar, SessionData::new()).unwrap();
        manager.clear(&mut jar);
        let after_first = jar.pending().to_vec();
        manager.clear(&mut jar);
        assert_eq!(jar.pending(), after_first.as_slice());
    }

    #[test]
    fn test_read_stops_at_gap() {
        // Given a session split across three fragments
        let manager = manager_with(config().with_max_fragment_bytes(40));
        let mut jar = RequestCookieJar::new();
        manager
            .write(&mut jar, session_with_token("abc123"))
            .unwrap();
        assert!(fragment_count(&jar, "yt_s") >= 3);

        // When the second fragment goes missing
        jar.set(SetCookie::removal("yt_s2"));

        // Then the session is unreadable rather than partially decoded
        assert!(manager.read(&jar).is_none());
    }

    #[test]
    fn test_read_other_secret_is_none() {
        let writer = manager_with(config());
        let mut jar = RequestCookieJar::new();
        writer.write(&mut jar, session_with_token("abc")).unwrap();

        let rotated = manager_with(
            SessionConfig::new(SessionSecret::new("rotated-secret").unwrap())
                .with_cookie_prefix("yt_s"),
        );
        assert!(rotated.read(&jar).is_none());
    }

    #[test]
    fn test_read_other_version_is_none() {
        let manager = manager_with(config());
        let secret = SessionSecret::new(SECRET).unwrap();
        let token = seal_json(&secret, &json!({"v": 2, "cookies": {"MUSIC_U": "x"}})).unwrap();

        let mut jar = RequestCookieJar::new();
        jar.set(SetCookie::new("yt_s1", token));

        assert!(manager.read(&jar).is_none());
    }

    #[test]
    fn test_read_invalid_cookie_is_not_deleted() {
        let manager = manager_with(config());
        let mut jar = RequestCookieJar::new();
        jar.set(SetCookie::new("yt_s1", "garbage"));
        let before = jar.pending().to_vec();

        assert!(manager.read(&jar).is_none());
        assert_eq!(jar.pending(), before.as_slice());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = SessionManager::new(config().with_max_fragments(0));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
