/// Test data factories: provider payloads and pipeline configuration
use keystone_sync::shared::PipelineConfig;
use serde_json::{json, Value};

/// Character rankings payload with one entry per player
pub fn rankings_payload<S: AsRef<str>>(players: &[S], has_more_pages: bool) -> Value {
    let rankings: Vec<Value> = players
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.as_ref();
            json!({
                "name": name,
                "score": 400.0 - i as f64,
                "duration": 1_800_000,
                "bracketData": 18,
                "faction": 1,
                "server": { "name": "Silvermoon", "region": "EU" },
                "report": { "code": format!("rep{}", name), "fightID": 7 }
            })
        })
        .collect();

    json!({ "worldData": { "encounter": { "characterRankings": {
        "page": 1,
        "hasMorePages": has_more_pages,
        "rankings": rankings
    }}}})
}

/// `count` distinct player names starting with `prefix`
pub fn players(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Report payload whose fight 7 has `players` friendly players
pub fn report_payload(code: &str, players: usize) -> Value {
    let actors: Vec<Value> = (1..=players)
        .map(|i| json!({ "id": i, "name": format!("Player{}", i), "server": "Silvermoon", "subType": "Priest" }))
        .collect();
    let friendly: Vec<usize> = (1..=players).collect();

    json!({ "reportData": { "report": {
        "code": code,
        "fights": [{
            "id": 7, "encounterID": 12660, "keystoneLevel": 18,
            "keystoneAffixes": [9, 10], "startTime": 0, "endTime": 1_800_000,
            "friendlyPlayers": friendly
        }],
        "masterData": { "actors": actors }
    }}})
}

/// Player details payload containing one healer
pub fn player_details_payload(name: &str, class_name: &str, spec: &str) -> Value {
    json!({ "reportData": { "report": { "playerDetails": { "data": { "playerDetails": {
        "healers": [{
            "name": name, "server": "Silvermoon", "type": class_name,
            "specs": [{ "spec": spec }],
            "combatantInfo": {
                "stats": { "Haste": { "min": 900, "max": 900 } },
                "talentTree": [{ "id": 101, "rank": 1 }],
                "gear": [{ "slot": 0, "id": 212000 }]
            }
        }]
    }}}}}})
}

/// Pipeline configuration with fast timings for `classes` x `specs` x `dungeons`
pub fn pipeline_config(classes: &[(&str, &[&str])], dungeons: &[i32]) -> PipelineConfig {
    let classes: Vec<Value> = classes
        .iter()
        .enumerate()
        .map(|(i, (name, specs))| {
            json!({ "name": name, "specs": specs, "slot": { "day": i % 7, "hour": (i * 7) % 24 } })
        })
        .collect();
    let dungeons: Vec<Value> = dungeons
        .iter()
        .map(|id| json!({ "id": id, "name": format!("Dungeon {}", id) }))
        .collect();

    let config = json!({
        "batch": { "size": 50, "retry_delay_ms": 10, "max_attempts": 3, "max_pages": 3 },
        "worker": {
            "num_workers": 4, "request_delay_ms": 0, "queue_capacity": 16,
            "requests_per_second": 1000.0, "burst": 100, "max_rate_limit_wait_secs": 30
        },
        "sync": { "batch_concurrency": 2 },
        "rankings": { "update_interval_secs": 3600 },
        "workflow": { "phase_timeout_secs": 600, "continuation_delay_secs": 1, "retention_days": 30 },
        "schedule": { "timezone": "UTC", "slot_window_minutes": 60 },
        "classes": classes,
        "dungeons": dungeons
    });

    PipelineConfig::from_json_str(&config.to_string()).expect("valid test config")
}
