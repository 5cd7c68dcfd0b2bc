//! Integration tests for the game and turn routes.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use serde_json::{Value, json};
use storyloom_core::notifier::TurnFact;
use storyloom_test_support::RecordingNotifier;
use uuid::Uuid;

struct Table {
    app: Router,
    game_id: Uuid,
    host: Uuid,
    alice: Uuid,
    bob: Uuid,
}

impl Table {
    fn uri(&self, path: &str) -> String {
        format!("/api/v1/games/{}{path}", self.game_id)
    }

    fn action_uri(&self, action_id: &str, path: &str) -> String {
        self.uri(&format!("/actions/{action_id}{path}"))
    }

    async fn persona_id(&self, name: &str) -> String {
        let (_, game) = common::get_json(&self.app, &self.uri("")).await;
        game["personas"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == name)
            .map(|p| p["persona_id"].as_str().unwrap().to_owned())
            .unwrap()
    }

    /// Alice proposes for Ada and returns the new action's id.
    async fn propose(&self) -> String {
        let ada = self.persona_id("Ada").await;
        let (status, json) = common::post_json(
            &self.app,
            &self.uri("/actions"),
            &json!({
                "actor_id": self.alice,
                "persona_id": ada,
                "description": "Pick the lock",
                "desired_outcome": "Open the vault",
                "opening_argument": "My hands are steady"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["action_id"].as_str().unwrap().to_owned()
    }
}

async fn start_table(app: Router) -> Table {
    let (host, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (status, json) = common::post_json(
        &app,
        "/api/v1/games",
        &json!({
            "host_id": host,
            "personas": [
                { "name": "Ada", "member_ids": [alice] },
                { "name": "Brin", "member_ids": [bob] }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");

    Table {
        app,
        game_id: Uuid::parse_str(json["game_id"].as_str().unwrap()).unwrap(),
        host,
        alice,
        bob,
    }
}

#[tokio::test]
async fn test_action_lifecycle_over_http() {
    // Arrange
    let notifier = Arc::new(RecordingNotifier::new());
    let table = start_table(common::build_test_app_with(notifier.clone())).await;

    // Act: propose, argue, vote
    let action_id = table.propose().await;
    let (status, _) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/arguments"),
        &json!({ "actor_id": table.bob, "argument_type": "FOR", "content": "The guards are asleep" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/arguments/complete"),
        &json!({ "actor_id": table.bob }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "voting");

    let (status, json) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/votes"),
        &json!({ "actor_id": table.bob, "vote_type": "LIKELY_SUCCESS" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "resolution");

    // Act: draw, narrate, edit
    let (status, draw) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/draw"),
        &json!({ "actor_id": table.alice }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/narration"),
        &json!({ "actor_id": table.alice, "content": "The vault swings open." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "proposal");

    let (status, _) = common::put_json(
        &table.app,
        &table.action_uri(&action_id, "/narration"),
        &json!({ "actor_id": table.host, "content": "The vault door groans open." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Assert: the draw came from a 3/1 pool and the mock RNG picks successes
    assert_eq!(draw["phase"], "narration");
    assert_eq!(draw["token_draw"]["pool"]["success_count"], 3);
    assert_eq!(draw["token_draw"]["pool"]["failure_count"], 1);
    assert_eq!(draw["token_draw"]["result_type"], "TRIUMPH");
    assert_eq!(draw["token_draw"]["result_value"], 3);

    let (status, actions) = common::get_json(&table.app, &table.uri("/actions")).await;
    assert_eq!(status, StatusCode::OK);
    let actions = actions.as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["action_id"], action_id.as_str());
    assert_eq!(actions[0]["votes"].as_array().unwrap().len(), 1);
    assert_eq!(
        actions[0]["narration"]["content"],
        "The vault door groans open."
    );
    assert_eq!(actions[0]["narration"]["edited_by"], table.host.to_string());

    let (status, game) = common::get_json(&table.app, &table.uri("")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["phase"], "proposal");
    assert_eq!(game["current_round"]["actions_completed"], 1);
    assert_eq!(game["current_round"]["total_actions_required"], 2);
    assert_eq!(game["current_action"], Value::Null);

    let resolved: Vec<TurnFact> = notifier
        .facts()
        .into_iter()
        .filter(|f| matches!(f, TurnFact::ActionResolved { .. }))
        .collect();
    assert_eq!(resolved.len(), 1);
    match &resolved[0] {
        TurnFact::ActionResolved { result_value, .. } => assert_eq!(*result_value, 3),
        other => panic!("expected ActionResolved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_second_draw_returns_the_same_draw_without_events() {
    // Arrange
    let table = start_table(common::build_test_app()).await;
    let action_id = table.propose().await;
    for path in ["/skip-argumentation", "/skip-voting"] {
        let (status, json) = common::post_json(
            &table.app,
            &table.action_uri(&action_id, path),
            &json!({ "actor_id": table.host }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
    }
    let draw_uri = table.action_uri(&action_id, "/draw");
    let body = json!({ "actor_id": table.alice });

    // Act
    let (_, first) = common::post_json(&table.app, &draw_uri, &body).await;
    let (status, second) = common::post_json(&table.app, &draw_uri, &body).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["token_draw"], second["token_draw"]);
    assert_eq!(first["event_ids"].as_array().unwrap().len(), 1);
    assert!(second["event_ids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_vote_during_argumentation_returns_409_phase_violation() {
    let table = start_table(common::build_test_app()).await;
    let action_id = table.propose().await;

    let (status, json) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/votes"),
        &json!({ "actor_id": table.bob, "vote_type": "UNCERTAIN" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "phase_violation");
}

#[tokio::test]
async fn test_skip_by_non_host_returns_403_not_eligible() {
    let table = start_table(common::build_test_app()).await;
    let action_id = table.propose().await;

    let (status, json) = common::post_json(
        &table.app,
        &table.action_uri(&action_id, "/skip-argumentation"),
        &json!({ "actor_id": table.bob }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "not_eligible");
}

#[tokio::test]
async fn test_replayed_skip_returns_409_already_advanced() {
    // Arrange
    let table = start_table(common::build_test_app()).await;
    let action_id = table.propose().await;
    let skip_uri = table.action_uri(&action_id, "/skip-argumentation");
    let body = json!({ "actor_id": table.host });
    let (status, _) = common::post_json(&table.app, &skip_uri, &body).await;
    assert_eq!(status, StatusCode::OK);

    // Act
    let (status, json) = common::post_json(&table.app, &skip_uri, &body).await;

    // Assert
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "already_advanced");
}

#[tokio::test]
async fn test_join_takes_effect_from_next_round() {
    // Arrange
    let table = start_table(common::build_test_app()).await;
    let wren = Uuid::new_v4();

    // Act
    let (status, _) = common::post_json(
        &table.app,
        &table.uri("/join"),
        &json!({ "player_id": wren, "target": { "kind": "new_persona", "name": "Wren" } }),
    )
    .await;
    let (_, game) = common::get_json(&table.app, &table.uri("")).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["personas"].as_array().unwrap().len(), 3);
    assert_eq!(game["current_round"]["total_actions_required"], 2);
}

#[tokio::test]
async fn test_designate_arbiter_by_host_is_reflected_in_game() {
    let table = start_table(common::build_test_app()).await;
    let arbiter = Uuid::new_v4();

    let (status, _) = common::post_json(
        &table.app,
        &table.uri("/arbiter"),
        &json!({ "actor_id": table.host, "arbiter_id": arbiter }),
    )
    .await;
    let (_, game) = common::get_json(&table.app, &table.uri("")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["arbiter_id"], arbiter.to_string());
}

#[tokio::test]
async fn test_timeout_reports_open_phase() {
    let table = start_table(common::build_test_app()).await;
    table.propose().await;

    let (status, json) = common::get_json(&table.app, &table.uri("/timeout")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "argumentation");
    assert_eq!(json["timeout_hours"], 24);
    assert_eq!(json["expired"], false);
}

#[tokio::test]
async fn test_get_unknown_game_returns_404() {
    let app = common::build_test_app();

    let (status, json) =
        common::get_json(&app, &format!("/api/v1/games/{}", Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");
}
