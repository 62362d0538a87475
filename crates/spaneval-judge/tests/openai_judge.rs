//! HTTP-level tests for the OpenAI judge and the scripted fake.

use mockito::Matcher;
use serde_json::json;
use spaneval_judge::fakes::ScriptedJudge;
use spaneval_judge::{rails, Judge, JudgeError, JudgeRecord, OpenAiJudge, OpenAiJudgeConfig};
use spaneval_store::EvalName;

fn judge(server: &mockito::Server) -> OpenAiJudge {
    OpenAiJudge::new(
        OpenAiJudgeConfig::new("sk-test")
            .with_model("gpt-4o-mini")
            .with_base_url(&server.url()),
    )
    .unwrap()
}

fn completion(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
    .to_string()
}

#[tokio::test]
async fn judge_sends_deterministic_json_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.0,
            "response_format": {"type": "json_object"}
        })))
        .with_status(200)
        .with_body(completion(
            r#"{"label": "Hallucinated", "explanation": "claims a date not in the reference"}"#,
        ))
        .create_async()
        .await;

    let record = JudgeRecord::qa("When?", "In 1999.", "No dates given.");
    let verdict = judge(&server)
        .score(&record, EvalName::Hallucination)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(verdict.label, "Hallucinated");
    assert_eq!(
        rails(EvalName::Hallucination).classify(&verdict.label).unwrap(),
        ("hallucinated", 1.0)
    );
}

#[tokio::test]
async fn judge_maps_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let err = judge(&server)
        .score(&JudgeRecord::document("q", "d"), EvalName::Relevance)
        .await
        .unwrap_err();

    assert!(matches!(err, JudgeError::RateLimited));
}

#[tokio::test]
async fn judge_reports_api_errors_with_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body("bad key")
        .create_async()
        .await;

    let err = judge(&server)
        .score(&JudgeRecord::document("q", "d"), EvalName::Relevance)
        .await
        .unwrap_err();

    match err {
        JudgeError::Api { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn judge_rejects_non_json_content() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(completion("LABEL: relevant"))
        .create_async()
        .await;

    let err = judge(&server)
        .score(&JudgeRecord::document("q", "d"), EvalName::Relevance)
        .await
        .unwrap_err();

    assert!(matches!(err, JudgeError::InvalidResponse(_)));
}

#[tokio::test]
async fn scripted_judge_defaults_overrides_and_failures() {
    let judge = ScriptedJudge::new();
    judge.answer(EvalName::QaCorrectness, "hard question", "incorrect");
    judge.fail_on("poison");

    let good = judge
        .score(&JudgeRecord::qa("easy", "a", "r"), EvalName::QaCorrectness)
        .await
        .unwrap();
    let scripted = judge
        .score(
            &JudgeRecord::qa("hard question", "a", "r"),
            EvalName::QaCorrectness,
        )
        .await
        .unwrap();
    let failed = judge
        .score(&JudgeRecord::document("q", "poison"), EvalName::Relevance)
        .await;

    assert_eq!(good.label, "correct");
    assert_eq!(scripted.label, "incorrect");
    assert!(failed.is_err());
    assert_eq!(judge.calls(), 3);
}
