mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{indexing_controller, notes, Harness};
use docqa::document::UploadedFile;
use docqa::error::QaError;
use docqa::session::Session;
use docqa::store::InMemoryStore;

#[test]
fn test_add_question_appends_empty_slots() {
    let harness = Harness::new();
    let mut session = Session::new();

    for expected in 0..5 {
        assert_eq!(harness.controller.add_question(&mut session), expected);
    }

    assert_eq!(session.questions().len(), 5);
    assert!(session.questions().iter().all(|q| q.is_empty()));
    assert_eq!(session.responses_len(), 0);
}

#[test]
fn test_edit_question_checks_bounds() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);

    harness
        .controller
        .edit_question(&mut session, 0, "What color is the sky?")
        .unwrap();
    assert_eq!(session.questions()[0], "What color is the sky?");

    let err = harness
        .controller
        .edit_question(&mut session, 1, "nope")
        .unwrap_err();
    assert!(matches!(err, QaError::QuestionIndex { index: 1, len: 1 }));
}

#[tokio::test]
async fn test_submit_without_upload_reports_no_document() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness
        .controller
        .edit_question(&mut session, 0, "What color is the sky?")
        .unwrap();

    let err = harness
        .controller
        .submit_question(&mut session, None, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, QaError::NoDocument));
    assert!(session.document().is_none());
    assert!(!session.has_query_engine());
    assert_eq!(harness.loads(), 0);
}

#[tokio::test]
async fn test_blank_question_never_reaches_collaborators() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);

    for text in ["", "   ", "\t\n "] {
        harness.controller.edit_question(&mut session, 0, text).unwrap();
        let err = harness
            .controller
            .submit_question(&mut session, Some(&upload), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::EmptyQuestion));
    }

    assert_eq!(harness.loads(), 0);
    assert_eq!(harness.model_creates(), 0);
    assert_eq!(harness.builds(), 0);
    assert!(harness.asked().is_empty());
}

#[tokio::test]
async fn test_submit_out_of_range_index() {
    let harness = Harness::new();
    let mut session = Session::new();

    let err = harness
        .controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::QuestionIndex { index: 0, len: 0 }));
    assert_eq!(harness.loads(), 0);
}

#[tokio::test]
async fn test_answers_the_sky_question() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();

    harness.controller.add_question(&mut session);
    harness
        .controller
        .edit_question(&mut session, 0, "What color is the sky?")
        .unwrap();
    let answer = harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();

    assert_eq!(harness.asked(), vec!["What color is the sky?".to_string()]);
    assert_eq!(
        answer,
        "Answer to 'What color is the sky?' from The sky is blue."
    );
    assert_eq!(session.response(0), Some(answer.as_str()));
    assert_eq!(session.document().unwrap().file_name, "notes.txt");
    assert!(session.has_query_engine());
}

#[tokio::test]
async fn test_question_is_trimmed_before_asking() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness
        .controller
        .edit_question(&mut session, 0, "  Why?  ")
        .unwrap();

    harness
        .controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap();
    assert_eq!(harness.asked(), vec!["Why?".to_string()]);
}

#[tokio::test]
async fn test_document_and_index_are_built_once() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();

    for i in 0..3 {
        harness.controller.add_question(&mut session);
        harness
            .controller
            .edit_question(&mut session, i, format!("Question number {}", i))
            .unwrap();
    }
    for i in [0, 1, 2, 1, 0] {
        harness
            .controller
            .submit_question(&mut session, Some(&upload), i)
            .await
            .unwrap();
        assert!(session.responses_len() <= session.questions().len());
    }

    assert_eq!(harness.loads(), 1);
    assert_eq!(harness.model_creates(), 1);
    assert_eq!(harness.builds(), 1);
    assert_eq!(harness.asked().len(), 5);
}

#[tokio::test]
async fn test_later_upload_does_not_replace_the_document() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness
        .controller
        .edit_question(&mut session, 0, "Colour?")
        .unwrap();

    harness
        .controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap();
    let other = UploadedFile::new("other.txt", "Grass is green.");
    let answer = harness
        .controller
        .submit_question(&mut session, Some(&other), 0)
        .await
        .unwrap();

    assert_eq!(harness.loads(), 1);
    assert_eq!(session.document().unwrap().file_name, "notes.txt");
    assert!(answer.ends_with("The sky is blue."));
}

#[tokio::test]
async fn test_resubmission_overwrites_the_same_slot() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);

    harness.controller.edit_question(&mut session, 0, "First?").unwrap();
    harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();
    harness.controller.edit_question(&mut session, 0, "Second?").unwrap();
    harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();

    assert_eq!(session.responses_len(), 1);
    assert!(session.response(0).unwrap().contains("Second?"));
    assert_eq!(session.render().len(), 1);
}

#[tokio::test]
async fn test_editing_keeps_the_stale_answer_until_resubmitted() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "First?").unwrap();
    harness
        .controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap();

    harness.controller.edit_question(&mut session, 0, "Changed?").unwrap();

    assert!(session.response(0).unwrap().contains("First?"));
    assert_eq!(harness.asked().len(), 1);
}

#[tokio::test]
async fn test_answering_out_of_order_leaves_gaps() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "Zero?").unwrap();
    harness.controller.edit_question(&mut session, 1, "One?").unwrap();

    harness
        .controller
        .submit_question(&mut session, Some(&notes()), 1)
        .await
        .unwrap();

    assert_eq!(session.response(0), None);
    assert!(session.response(1).is_some());
    assert!(session.responses_len() <= session.questions().len());

    let pairs = session.render();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].index, 1);
    assert_eq!(pairs[0].question, "One?");
}

#[tokio::test]
async fn test_query_failure_keeps_cached_engine() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);
    harness
        .controller
        .edit_question(&mut session, 0, "What color is the sky?")
        .unwrap();
    harness.index_builder.log.fail_next.store(1, Ordering::SeqCst);

    let err = harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::Query(_)));
    assert!(session.document().is_some());
    assert!(session.has_query_engine());
    assert_eq!(session.response(0), None);

    harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();

    assert_eq!(harness.loads(), 1);
    assert_eq!(harness.builds(), 1);
    assert_eq!(harness.asked().len(), 2);
    assert!(session.response(0).is_some());
}

#[tokio::test]
async fn test_load_failure_can_be_retried() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "Sky?").unwrap();
    harness.loader.fail_next.store(1, Ordering::SeqCst);

    let err = harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::Load(_)));
    assert!(session.document().is_none());
    assert_eq!(harness.builds(), 0);

    harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();
    assert_eq!(harness.loads(), 2);
    assert!(session.document().is_some());
}

#[tokio::test]
async fn test_build_failure_keeps_document_and_retries_build() {
    let harness = Harness::new();
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "Sky?").unwrap();
    harness.index_builder.fail_next.store(1, Ordering::SeqCst);

    let err = harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::Build(_)));
    assert!(session.document().is_some());
    assert!(!session.has_query_engine());

    harness
        .controller
        .submit_question(&mut session, Some(&upload), 0)
        .await
        .unwrap();
    assert_eq!(harness.loads(), 1);
    assert_eq!(harness.builds(), 2);
}

#[tokio::test]
async fn test_missing_api_key_fails_every_submission() {
    let harness = Harness::with_api_key(None);
    let mut session = Session::new();
    let upload = notes();
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "Sky?").unwrap();

    for _ in 0..2 {
        let err = harness
            .controller
            .submit_question(&mut session, Some(&upload), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Config(_)));
        assert!(err.is_configuration());
    }

    assert_eq!(harness.loads(), 1);
    assert_eq!(harness.model_creates(), 2);
    assert_eq!(harness.builds(), 0);
    assert!(session.document().is_some());
    assert!(!session.has_query_engine());
}

#[tokio::test]
async fn test_ending_a_session_releases_its_index() {
    let harness = Harness::new();
    let mut session = Session::new();
    harness.controller.add_question(&mut session);
    harness.controller.edit_question(&mut session, 0, "Sky?").unwrap();
    harness
        .controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap();

    harness.controller.end_session(session).await;
    assert_eq!(harness.released(), 1);

    // Nothing to release before an index exists
    harness.controller.end_session(Session::new()).await;
    assert_eq!(harness.released(), 1);
}

#[tokio::test]
async fn test_ending_a_session_drops_its_collection() {
    let store = Arc::new(InMemoryStore::new());
    let controller = indexing_controller(store.clone());
    let mut session = Session::new();
    controller.add_question(&mut session);
    controller.edit_question(&mut session, 0, "Sky?").unwrap();

    controller
        .submit_question(&mut session, Some(&notes()), 0)
        .await
        .unwrap();
    assert_eq!(store.collection_names().await.len(), 1);

    controller.end_session(session).await;
    assert!(store.collection_names().await.is_empty());
}
