//! Scripted demonstration flow
//!
//! Runs the full coordinator surface against the scripted platform: session
//! lifecycle with arbitration, the player-data reads and writes, a
//! matchmaking search, and the shutdown drain.

use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use matchlink_core::player_data::{setting_ids, ContentItem, StorageBlob, STORAGE_DATA_VERSION};
use matchlink_core::{
    Achievement, EventKind, MatchType, OnlineEvent, PlayerId, RosterEntry, SessionDescriptor,
    SessionName, SessionSettings, UserIndex,
};
use matchlink_harness::ScriptedPlatform;
use matchlink_runtime::{OnlineCoordinator, SessionState};

use crate::cli::Cli;
use crate::config::AppConfig;

/// Build the scripted platform with plausible canned data
fn build_platform(latency_polls: u32) -> ScriptedPlatform {
    let mut platform = ScriptedPlatform::auto(latency_polls);
    let canned = platform.canned_mut();
    canned.content_pages = vec![
        vec![ContentItem {
            id: 1,
            name: "map pack: highlands".to_string(),
            size_bytes: 48 * 1024,
        }],
        vec![ContentItem {
            id: 2,
            name: "map pack: lowlands".to_string(),
            size_bytes: 52 * 1024,
        }],
    ];
    canned.achievements = vec![
        Achievement {
            id: 1,
            title: "First Match".to_string(),
            unlocked: true,
        },
        Achievement {
            id: 2,
            title: "Undefeated".to_string(),
            unlocked: false,
        },
    ];
    canned.search_results = vec![SessionDescriptor {
        host: PlayerId::new(0x7777),
        settings: SessionSettings::default(),
        open_public_slots: 5,
        open_private_slots: 0,
    }];
    platform
}

/// Register logging observers for every completion the demo exercises
fn register_observers(coordinator: &mut OnlineCoordinator<ScriptedPlatform>) {
    let kinds = [
        EventKind::SessionCreateComplete,
        EventKind::SessionStartComplete,
        EventKind::SessionEndComplete,
        EventKind::SessionDestroyComplete,
        EventKind::ArbitrationComplete,
        EventKind::SearchComplete,
        EventKind::ProfileReadComplete,
        EventKind::StorageWriteComplete,
        EventKind::ContentListComplete,
        EventKind::AchievementsReadComplete,
    ];
    for kind in kinds {
        coordinator.register_callback(kind, |event| {
            if event.is_success() {
                info!(?event, "completion");
            } else {
                warn!(?event, "completion failed");
            }
        });
    }
    coordinator.register_callback(EventKind::SignInChanged, |event| {
        if let OnlineEvent::SignInChanged { user, .. } = event {
            info!(%user, "sign-in changed");
        }
    });
}

/// Tick until the queue is empty or the per-phase budget runs out
fn settle(
    coordinator: &mut OnlineCoordinator<ScriptedPlatform>,
    delta: Duration,
    max_ticks: u32,
) -> anyhow::Result<()> {
    for _ in 0..max_ticks {
        if coordinator.pending_tasks() == 0 {
            return Ok(());
        }
        coordinator.tick(delta);
    }
    if coordinator.pending_tasks() > 0 {
        bail!("phase did not settle within {max_ticks} ticks");
    }
    Ok(())
}

/// Run the demo flow end to end
pub fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    let delta = Duration::from_millis(cli.tick_ms);
    let platform = build_platform(cli.latency_polls);
    let mut coordinator = OnlineCoordinator::new(platform, config.coordinator.clone())
        .context("building coordinator")?;
    register_observers(&mut coordinator);

    let name = SessionName::from(config.demo.session_name.as_str());
    let user = UserIndex::new(0);
    let settings = SessionSettings {
        public_slots: 8,
        uses_arbitration: true,
        match_type: MatchType::Ranked,
        ..SessionSettings::default()
    };

    // Arbitration roster mirrors the players we register below
    coordinator.platform_mut().canned_mut().roster = (0..config.demo.players)
        .map(|index| RosterEntry {
            machine_id: 100 + index as u64,
            player: PlayerId::new(0x1000 + index as u64),
            trust_factor: 0.9,
        })
        .collect();

    coordinator.notify_sign_in_changed(user, Some(PlayerId::new(0x1000)));

    info!(session = %name, "creating session");
    coordinator.create_session(name.clone(), settings)?;
    settle(&mut coordinator, delta, cli.max_ticks)?;

    for index in 0..config.demo.players {
        coordinator.register_player(&name, PlayerId::new(0x1000 + index as u64))?;
    }
    info!(players = config.demo.players, "players registered");

    info!("running arbitration");
    coordinator.register_arbitration(name.clone())?;
    settle(&mut coordinator, delta, cli.max_ticks)?;
    if let Some(session) = coordinator.session(&name) {
        info!(
            public_slots = session.settings.public_slots,
            registrants = session.registrants().len(),
            "arbitration complete"
        );
    }

    info!("starting session");
    coordinator.start_session(name.clone())?;
    settle(&mut coordinator, delta, cli.max_ticks)?;

    info!("reading player data");
    coordinator.read_profile(
        user,
        vec![
            setting_ids::CONTROLLER_VIBRATION,
            setting_ids::INVERT_Y_AXIS,
            setting_ids::PREFERRED_COLOR,
        ],
    )?;
    coordinator.enumerate_content(user)?;
    coordinator.read_achievements(user)?;
    settle(&mut coordinator, delta, cli.max_ticks)?;

    info!("writing save data");
    coordinator.write_storage(
        user,
        StorageBlob {
            version: STORAGE_DATA_VERSION,
            data: b"campaign checkpoint 7".to_vec(),
        },
    )?;
    settle(&mut coordinator, delta, cli.max_ticks)?;

    info!("searching for other sessions");
    coordinator.find_sessions(MatchType::Standard, 8)?;
    settle(&mut coordinator, delta, cli.max_ticks)?;

    info!("ending session");
    coordinator.end_session(name.clone())?;
    settle(&mut coordinator, delta, cli.max_ticks)?;
    if coordinator.session_state(&name) != Some(SessionState::Ended) {
        bail!("session did not reach Ended");
    }

    for session in coordinator.registry().iter() {
        info!(
            session = %session.name(),
            state = session.state().state_name(),
            registrants = session.registrants().len(),
            "registry entry"
        );
    }

    info!("destroying session and draining");
    coordinator.destroy_session(name)?;
    coordinator.drain_and_shutdown();

    info!("demo complete");
    Ok(())
}
