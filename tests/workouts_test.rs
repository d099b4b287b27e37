mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{create_test_app, TestApp};

async fn create_workout(app: &TestApp, token: &str, name: &str) -> String {
    let response = app.post("/workouts", token, json!({ "name": name })).await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.body["id"].as_str().unwrap().to_string()
}

/// Attach exercises and return the new workout-exercise ids in order.
async fn attach(app: &TestApp, token: &str, workout_id: &str, exercise_ids: &[&str]) -> Vec<String> {
    let response = app
        .post(
            &format!("/workouts/{}/exercises", workout_id),
            token,
            json!({ "exercise_ids": exercise_ids }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.body["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

async fn add_set(
    app: &TestApp,
    token: &str,
    workout_id: &str,
    workout_exercise_id: &str,
    body: Value,
) -> common::TestResponse {
    app.post(
        &format!("/workouts/{}/exercises/{}/sets", workout_id, workout_exercise_id),
        token,
        body,
    )
    .await
}

#[tokio::test]
async fn test_create_and_list_workouts() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;

    let blank = app.post("/workouts", &token, json!({ "name": "   " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let first = create_workout(&app, &token, " Push ").await;
    let second = create_workout(&app, &token, "Pull").await;
    let slots = attach(&app, &token, &first, &["builtin-bench-press"]).await;
    add_set(&app, &token, &first, &slots[0], json!({ "reps": 5, "weight": 80.0 })).await;

    let response = app.get("/workouts", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    let workouts = response.body.as_array().unwrap();
    assert_eq!(workouts.len(), 2);

    let push = workouts.iter().find(|w| w["id"] == first.as_str()).unwrap();
    assert_eq!(push["name"], "Push");
    assert_eq!(push["exercise_count"], 1);
    assert_eq!(push["set_count"], 1);

    let pull = workouts.iter().find(|w| w["id"] == second.as_str()).unwrap();
    assert_eq!(pull["exercise_count"], 0);
}

#[tokio::test]
async fn test_workouts_are_private() {
    let app = create_test_app();
    let (_, owner) = app.verified_user("owner@example.com").await;
    let (_, other) = app.verified_user("other@example.com").await;
    let workout_id = create_workout(&app, &owner, "Legs").await;

    let uri = format!("/workouts/{}", workout_id);
    assert_eq!(app.get(&uri, &other).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.put(&uri, &other, json!({ "name": "Mine" })).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete(&uri, &other).await.status, StatusCode::NOT_FOUND);
    assert!(app.get("/workouts", &other).await.body.as_array().unwrap().is_empty());

    assert_eq!(app.get(&uri, &owner).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rename_workout() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;

    let response = app
        .put(&format!("/workouts/{}", workout_id), &token, json!({ "name": "Leg Day" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Leg Day");
    assert!(response.body["exercises"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_attach_requires_visible_exercises() {
    let app = create_test_app();
    let (_, owner) = app.verified_user("owner@example.com").await;
    let (_, other) = app.verified_user("other@example.com").await;
    let workout_id = create_workout(&app, &owner, "Arms").await;
    let uri = format!("/workouts/{}/exercises", workout_id);

    let empty = app.post(&uri, &owner, json!({ "exercise_ids": [] })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .post(&uri, &owner, json!({ "exercise_ids": ["builtin-squat", "nope"] }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let foreign = app
        .post(
            "/exercises",
            &other,
            json!({ "name": "Secret Curl", "category": "dumbbell", "body_part": "arms" }),
        )
        .await;
    let foreign_id = foreign.body["id"].as_str().unwrap();
    let response = app
        .post(&uri, &owner, json!({ "exercise_ids": [foreign_id] }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // Nothing was attached by the failed requests.
    let detail = app.get(&format!("/workouts/{}", workout_id), &owner).await;
    assert!(detail.body["exercises"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reorder_exercises() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Full Body").await;
    let slots = attach(
        &app,
        &token,
        &workout_id,
        &["builtin-squat", "builtin-bench-press", "builtin-deadlift"],
    )
    .await;
    let uri = format!("/workouts/{}/exercises/order", workout_id);

    let response = app
        .put(
            &uri,
            &token,
            json!({ "workout_exercise_ids": [slots[2], slots[0], slots[1]] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let order: Vec<&str> = response.body["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["exercise_id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["builtin-deadlift", "builtin-squat", "builtin-bench-press"]);

    let partial = app
        .put(&uri, &token, json!({ "workout_exercise_ids": [slots[0], slots[1]] }))
        .await;
    assert_eq!(partial.status, StatusCode::BAD_REQUEST);

    let duplicated = app
        .put(
            &uri,
            &token,
            json!({ "workout_exercise_ids": [slots[0], slots[0], slots[1]] }),
        )
        .await;
    assert_eq!(duplicated.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replace_exercise_keeps_position_and_drops_sets() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(&app, &token, &workout_id, &["builtin-squat", "builtin-deadlift"]).await;
    add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 100.0 })).await;

    let response = app
        .put(
            &format!("/workouts/{}/exercises/{}", workout_id, slots[0]),
            &token,
            json!({ "exercise_id": "builtin-leg-press" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let first = &response.body["exercises"][0];
    assert_eq!(first["id"], slots[0].as_str());
    assert_eq!(first["exercise_id"], "builtin-leg-press");
    assert_eq!(first["position"], 0);
    assert!(first["sets"].as_array().unwrap().is_empty());

    let missing = app
        .put(
            &format!("/workouts/{}/exercises/{}", workout_id, "nope"),
            &token,
            json!({ "exercise_id": "builtin-squat" }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_exercise_closes_gap() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(
        &app,
        &token,
        &workout_id,
        &["builtin-squat", "builtin-deadlift", "builtin-leg-press"],
    )
    .await;
    add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 100.0 })).await;

    let response = app
        .delete(&format!("/workouts/{}/exercises/{}", workout_id, slots[0]), &token)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let detail = app.get(&format!("/workouts/{}", workout_id), &token).await;
    let exercises = detail.body["exercises"].as_array().unwrap();
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0]["position"], 0);
    assert_eq!(exercises[1]["position"], 1);

    let cleared = app
        .delete(&format!("/workouts/{}/exercises", workout_id), &token)
        .await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    let detail = app.get(&format!("/workouts/{}", workout_id), &token).await;
    assert!(detail.body["exercises"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_set_lifecycle() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(&app, &token, &workout_id, &["builtin-squat"]).await;

    let first = add_set(
        &app,
        &token,
        &workout_id,
        &slots[0],
        json!({ "reps": 10, "weight": 60.0, "set_type": "warmup" }),
    )
    .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["set_number"], 1);
    assert_eq!(first.body["set_type"], "warmup");
    assert_eq!(first.body["completed"], false);

    let second = add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 100.0 })).await;
    let third = add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 105.0 })).await;
    assert_eq!(second.body["set_number"], 2);
    assert_eq!(second.body["set_type"], "default");
    assert_eq!(third.body["set_number"], 3);

    let second_id = second.body["id"].as_str().unwrap();
    let replaced = app
        .put(
            &format!("/workouts/{}/sets/{}", workout_id, second_id),
            &token,
            json!({ "reps": 6, "weight": 100.0, "set_type": "failure", "completed": true }),
        )
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.body["reps"], 6);
    assert_eq!(replaced.body["set_type"], "failure");
    assert_eq!(replaced.body["completed"], true);

    // Full replace: omitted fields are an error, not a partial update.
    let partial = app
        .put(
            &format!("/workouts/{}/sets/{}", workout_id, second_id),
            &token,
            json!({ "reps": 7 }),
        )
        .await;
    assert!(partial.status.is_client_error());

    let first_id = first.body["id"].as_str().unwrap();
    let deleted = app
        .delete(&format!("/workouts/{}/sets/{}", workout_id, first_id), &token)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let detail = app.get(&format!("/workouts/{}", workout_id), &token).await;
    let numbers: Vec<i64> = detail.body["exercises"][0]["sets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["set_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    let cleared = app
        .delete(&format!("/workouts/{}/sets", workout_id), &token)
        .await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    let detail = app.get(&format!("/workouts/{}", workout_id), &token).await;
    assert!(detail.body["exercises"][0]["sets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_set_validation() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(&app, &token, &workout_id, &["builtin-squat"]).await;

    for body in [
        json!({ "reps": -1, "weight": 100.0 }),
        json!({ "reps": 1001, "weight": 100.0 }),
        json!({ "reps": 5, "weight": -0.5 }),
        json!({ "reps": 5, "weight": 10001.0 }),
    ] {
        let response = add_set(&app, &token, &workout_id, &slots[0], body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    let bodyweight = add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 0, "weight": 0.0 })).await;
    assert_eq!(bodyweight.status, StatusCode::CREATED);

    let wrong_slot = add_set(&app, &token, &workout_id, "nope", json!({ "reps": 5, "weight": 1.0 })).await;
    assert_eq!(wrong_slot.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sets_cannot_cross_workouts() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let first = create_workout(&app, &token, "A").await;
    let second = create_workout(&app, &token, "B").await;
    let slots = attach(&app, &token, &first, &["builtin-squat"]).await;
    let set = add_set(&app, &token, &first, &slots[0], json!({ "reps": 5, "weight": 1.0 })).await;
    let set_id = set.body["id"].as_str().unwrap();

    let via_other = app
        .delete(&format!("/workouts/{}/sets/{}", second, set_id), &token)
        .await;
    assert_eq!(via_other.status, StatusCode::NOT_FOUND);

    let slot_via_other = add_set(&app, &token, &second, &slots[0], json!({ "reps": 5, "weight": 1.0 })).await;
    assert_eq!(slot_via_other.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_workout_cascades() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(&app, &token, &workout_id, &["builtin-squat"]).await;
    add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 1.0 })).await;

    let response = app.delete(&format!("/workouts/{}", workout_id), &token).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("/workouts/{}", workout_id), &token).await.status,
        StatusCode::NOT_FOUND
    );

    let conn = app.pool.get().unwrap();
    let orphans: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM workout_exercises) + (SELECT COUNT(*) FROM sets)",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn test_complete_workout_records_history() {
    let app = create_test_app();
    let (_, token) = app.verified_user("sam@example.com").await;
    let workout_id = create_workout(&app, &token, "Legs").await;
    let slots = attach(&app, &token, &workout_id, &["builtin-squat", "builtin-deadlift"]).await;
    let complete_uri = format!("/workouts/{}/complete", workout_id);

    let nothing = app.post(&complete_uri, &token, json!({})).await;
    assert_eq!(nothing.status, StatusCode::BAD_REQUEST);

    add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 10, "weight": 50.0, "set_type": "warmup", "completed": true })).await;
    add_set(&app, &token, &workout_id, &slots[0], json!({ "reps": 5, "weight": 100.0, "completed": true })).await;
    add_set(&app, &token, &workout_id, &slots[1], json!({ "reps": 3, "weight": 140.0, "completed": true })).await;
    add_set(&app, &token, &workout_id, &slots[1], json!({ "reps": 3, "weight": 150.0 })).await;

    let response = app.post(&complete_uri, &token, json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["workout_name"], "Legs");
    assert_eq!(response.body["exercise_count"], 2);
    assert_eq!(response.body["set_count"], 3);
    assert_eq!(response.body["total_reps"], 18);
    // Warmups do not count toward volume.
    assert_eq!(response.body["total_volume"].as_f64().unwrap(), 920.0);

    // Flags are reset so the workout can be run again.
    let detail = app.get(&format!("/workouts/{}", workout_id), &token).await;
    let all_open = detail.body["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|e| e["sets"].as_array().unwrap().iter())
        .all(|s| s["completed"] == false);
    assert!(all_open);

    let again = app.post(&complete_uri, &token, json!({})).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}
