//! End-to-end journeys driving the lifecycle hooks the way a host would.
//!
//! Journey 1: Site gate in redirect mode (block, key, remembered)
//! Journey 2: Area scoping
//! Journey 3: Admin denial handed off to the site in message mode
//! Journey 4: Administrative logout

use keygate::session::{SessionHandle, SessionKey, SessionRegistry};
use keygate::{
    on_after_initialise, on_user_after_logout, ConfigSecret, GateConfig, Outcome, RootConfig,
};
use keygate_core::{Area, BlockMode, Client, RequestContext, Timestamp, Unauthorized};
use std::collections::HashMap;
use url::Url;

const NOW: i64 = 1_760_000_000;

fn root() -> Url {
    Url::parse("https://shop.example/").unwrap()
}

fn config(area: Area, mode: BlockMode) -> RootConfig {
    RootConfig {
        secret: ConfigSecret::new("journey-secret"),
        gate: GateConfig {
            area,
            security_key: "MY_SECRET".into(),
            block_mode: mode,
            ..GateConfig::default()
        },
        ..RootConfig::default()
    }
}

/// One browser: a site session and an admin session in the same registry.
struct Browser<'a> {
    registry: &'a SessionRegistry,
    site: SessionKey,
    admin: SessionKey,
}

impl<'a> Browser<'a> {
    fn new(registry: &'a SessionRegistry) -> Self {
        Self {
            registry,
            site: registry.issue_key(Client::Site),
            admin: registry.issue_key(Client::Admin),
        }
    }

    fn session(&self, client: Client) -> SessionHandle<'a> {
        match client {
            Client::Admin => self.registry.handle(self.admin.clone()),
            _ => self.registry.handle(self.site.clone()),
        }
    }

    fn visit(&self, config: &RootConfig, client: Client, path: &str, now: i64) -> Outcome {
        let mut ctx = RequestContext::from_path(client, &root(), path).unwrap();
        on_after_initialise(
            &mut ctx,
            &config.gate,
            &self.session(client),
            config,
            Timestamp::from_seconds(now),
        )
        .unwrap()
    }

    fn logout(&self) -> Outcome {
        let ctx = RequestContext::from_path(Client::Admin, &root(), "/administrator/logout").unwrap();
        on_user_after_logout(&ctx, &self.session(Client::Admin))
    }
}

fn redirect_location(outcome: Outcome) -> Url {
    match outcome {
        Outcome::Redirect { location } => location,
        other => panic!("expected redirect, got {other:?}"),
    }
}

// ============================================================================
// Journey 1: Site gate in redirect mode
// ============================================================================

#[test]
fn test_journey_site_redirect_mode() {
    let config = config(Area::Site, BlockMode::Redirect);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    // No key, no flag: sent to the application root
    let outcome = browser.visit(&config, Client::Site, "/index.php", NOW);
    assert_eq!(redirect_location(outcome), root());

    // Landing on the root itself is not redirected again
    assert_eq!(browser.visit(&config, Client::Site, "/", NOW), Outcome::Proceed);

    // Presenting the key opens the session
    assert_eq!(
        browser.visit(&config, Client::Site, "/?MY_SECRET", NOW),
        Outcome::Proceed
    );

    // And it stays open without the key
    for path in ["/index.php", "/blog?page=2", "/cart"] {
        assert_eq!(
            browser.visit(&config, Client::Site, path, NOW),
            Outcome::Proceed,
            "{path} should be remembered"
        );
    }
}

#[test]
fn test_journey_empty_key_value_counts() {
    let config = config(Area::Site, BlockMode::Redirect);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    assert_eq!(
        browser.visit(&config, Client::Site, "/shop?MY_SECRET=", NOW),
        Outcome::Proceed
    );
    assert_eq!(
        browser.visit(&config, Client::Site, "/shop", NOW),
        Outcome::Proceed
    );
}

#[test]
fn test_journey_wrong_key_name_blocked() {
    let config = config(Area::Site, BlockMode::Redirect);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let outcome = browser.visit(&config, Client::Site, "/shop?my_secret", NOW);
    assert!(matches!(outcome, Outcome::Redirect { .. }));
}

#[test]
fn test_journey_custom_redirect_target() {
    let mut config = config(Area::Site, BlockMode::Redirect);
    config.gate.redirect_url = "/closed".into();
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let location = redirect_location(browser.visit(&config, Client::Site, "/shop", NOW));
    assert_eq!(location.as_str(), "https://shop.example/closed");

    // The target itself is reachable without a key
    assert_eq!(
        browser.visit(&config, Client::Site, "/closed", NOW),
        Outcome::Proceed
    );
}

// ============================================================================
// Journey 2: Area scoping
// ============================================================================

#[test]
fn test_journey_area_scoping() {
    let registry = SessionRegistry::new(3600);

    let site_only = config(Area::Site, BlockMode::Redirect);
    let browser = Browser::new(&registry);
    assert_eq!(
        browser.visit(&site_only, Client::Admin, "/administrator/", NOW),
        Outcome::Proceed
    );
    assert!(matches!(
        browser.visit(&site_only, Client::Site, "/shop", NOW),
        Outcome::Redirect { .. }
    ));

    let admin_only = config(Area::Admin, BlockMode::Redirect);
    let browser = Browser::new(&registry);
    assert_eq!(
        browser.visit(&admin_only, Client::Site, "/shop", NOW),
        Outcome::Proceed
    );
    assert!(matches!(
        browser.visit(&admin_only, Client::Admin, "/administrator/", NOW),
        Outcome::Redirect { .. }
    ));

    let all = config(Area::All, BlockMode::Redirect);
    let browser = Browser::new(&registry);
    assert!(matches!(
        browser.visit(&all, Client::Site, "/shop", NOW),
        Outcome::Redirect { .. }
    ));
    assert!(matches!(
        browser.visit(&all, Client::Admin, "/administrator/", NOW),
        Outcome::Redirect { .. }
    ));
}

#[test]
fn test_journey_contexts_remember_independently() {
    let config = config(Area::All, BlockMode::Redirect);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    assert_eq!(
        browser.visit(&config, Client::Site, "/?MY_SECRET", NOW),
        Outcome::Proceed
    );
    // The admin context has its own session and has not seen the key
    assert!(matches!(
        browser.visit(&config, Client::Admin, "/administrator/", NOW),
        Outcome::Redirect { .. }
    ));
}

#[test]
fn test_journey_frontend_key_override() {
    let mut config = config(Area::All, BlockMode::Redirect);
    config.gate.security_key_frontend = "SHOP_KEY".into();
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    assert!(matches!(
        browser.visit(&config, Client::Site, "/shop?MY_SECRET", NOW),
        Outcome::Redirect { .. }
    ));
    assert_eq!(
        browser.visit(&config, Client::Site, "/shop?SHOP_KEY", NOW),
        Outcome::Proceed
    );
    assert_eq!(
        browser.visit(&config, Client::Admin, "/administrator/?MY_SECRET", NOW),
        Outcome::Proceed
    );
}

// ============================================================================
// Journey 3: Denial handoff in message mode
// ============================================================================

#[test]
fn test_journey_admin_denial_raised_on_site() {
    let config = config(Area::All, BlockMode::Message);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let location = redirect_location(browser.visit(
        &config,
        Client::Admin,
        "/administrator/index.php?option=com_login&task=logout",
        NOW,
    ));
    assert_eq!(location.host_str(), Some("shop.example"));
    assert_eq!(location.path(), "/");

    let params: HashMap<String, String> = location.query_pairs().into_owned().collect();
    assert_eq!(params["ba_throw"], "1");
    assert_eq!(params["ba_code"], "401");
    assert_eq!(params["ba_msg"], "Unauthorized");
    assert_eq!(params["ba_ts"], NOW.to_string());
    assert_eq!(params["ba_n"].len(), 32);
    assert!(params["ba_n"].chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(params["ba_sig"].len(), 64);
    assert!(params["ba_sig"].chars().all(|c| c.is_ascii_hexdigit()));

    // Browser follows the redirect within the window
    let follow = format!("/?{}", location.query().unwrap());
    let outcome = browser.visit(&config, Client::Site, &follow, NOW + 12);
    assert_eq!(
        outcome,
        Outcome::Raise(Unauthorized::with_code(401, "Unauthorized"))
    );
}

#[test]
fn test_journey_handoff_expires() {
    let handoff_config = config(Area::All, BlockMode::Message);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let location = redirect_location(browser.visit(
        &handoff_config,
        Client::Admin,
        "/administrator/",
        NOW,
    ));
    let follow = format!("/?{}", location.query().unwrap());

    // Site gate is off for this check so only the incoming handler can raise
    let receiving = config(Area::Admin, BlockMode::Message);
    assert!(matches!(
        browser.visit(&receiving, Client::Site, &follow, NOW + 30),
        Outcome::Raise(_)
    ));
    assert_eq!(
        browser.visit(&receiving, Client::Site, &follow, NOW + 31),
        Outcome::Proceed
    );
}

#[test]
fn test_journey_forged_handoff_ignored() {
    let config = config(Area::Admin, BlockMode::Message);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let forged = format!(
        "/?ba_throw=1&ba_code=500&ba_msg=Database+down&ba_ts={NOW}&ba_n={}&ba_sig={}",
        "0".repeat(32),
        "f".repeat(64)
    );
    assert_eq!(
        browser.visit(&config, Client::Site, &forged, NOW),
        Outcome::Proceed
    );
}

#[test]
fn test_journey_handoff_replays_within_window() {
    // No single-use tracking: a captured URL re-raises until it expires
    let config = config(Area::Admin, BlockMode::Message);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let location = redirect_location(browser.visit(&config, Client::Admin, "/administrator/", NOW));
    let follow = format!("/?{}", location.query().unwrap());

    let other = Browser::new(&registry);
    for b in [&browser, &other] {
        assert!(matches!(
            b.visit(&config, Client::Site, &follow, NOW + 1),
            Outcome::Raise(_)
        ));
    }
}

#[test]
fn test_journey_admin_handoff_target_stops_redirecting() {
    // Hosts reject this in config validation; the hooks still must not loop
    let mut config = config(Area::Admin, BlockMode::Message);
    config.gate.redirect_url = "/administrator/".into();
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    let mut path = "/administrator/index.php".to_string();
    let mut hops = 0;
    loop {
        match browser.visit(&config, Client::Admin, &path, NOW) {
            Outcome::Redirect { location } => {
                hops += 1;
                assert!(hops < 3, "still redirecting after {hops} hops");
                path = format!("{}?{}", location.path(), location.query().unwrap_or(""));
            }
            Outcome::Proceed => break,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(hops, 1);
}

#[test]
fn test_journey_site_message_mode_raises_locally() {
    let mut config = config(Area::Site, BlockMode::Message);
    config.gate.message = "Shop closed".into();
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    assert_eq!(
        browser.visit(&config, Client::Site, "/shop", NOW),
        Outcome::Raise(Unauthorized::with_code(401, "Shop closed"))
    );
}

// ============================================================================
// Journey 4: Administrative logout
// ============================================================================

#[test]
fn test_journey_logout_closes_admin_session() {
    let config = config(Area::Admin, BlockMode::Redirect);
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);

    assert_eq!(
        browser.visit(&config, Client::Admin, "/administrator/?MY_SECRET", NOW),
        Outcome::Proceed
    );
    assert_eq!(
        browser.visit(&config, Client::Admin, "/administrator/index.php", NOW),
        Outcome::Proceed
    );

    assert_eq!(redirect_location(browser.logout()), root());

    assert!(matches!(
        browser.visit(&config, Client::Admin, "/administrator/index.php", NOW),
        Outcome::Redirect { .. }
    ));
}

#[test]
fn test_journey_logout_without_key_still_redirects() {
    let registry = SessionRegistry::new(3600);
    let browser = Browser::new(&registry);
    assert_eq!(redirect_location(browser.logout()), root());
}
