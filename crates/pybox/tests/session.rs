use pybox::SessionBuilder;
use pybox_test_model::{PresetTurn, TestModelProvider};

#[tokio::test]
async fn test_session_round_trip() {
    let mut provider = TestModelProvider::default();
    provider.add_incoming_step();
    provider.add_assistant_turn(PresetTurn::with_content(
        "Sure, I can run Python for you.",
    ));

    let mut session = SessionBuilder::with_model_provider(provider)
        .with_system_prompt("Be helpful.")
        .with_output_dir(std::env::temp_dir().join("pybox-session-test"))
        .build();

    let reply = session.send_message("What can you do?").await.unwrap();
    assert_eq!(reply, "Sure, I can run Python for you.");
}

#[tokio::test]
async fn test_session_surfaces_provider_errors() {
    // An exhausted provider fails the turn instead of panicking.
    let provider = TestModelProvider::default();
    let mut session =
        SessionBuilder::with_model_provider(provider).build();
    assert!(session.send_message("Hello").await.is_err());
}
