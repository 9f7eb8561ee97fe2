// Tests for the conversation service against the in-memory store.

use std::sync::Arc;

use fyp_chat_core::domain::{
    AttachmentKind, DraftKind, MessageDraft, MessageType, Participant, ParticipantRole, TagKind,
    TagRef,
};
use fyp_chat_core::memory::{InMemoryCatalog, InMemoryRoster, InMemoryStore};
use fyp_chat_core::service::{ConversationService, ServiceError, MAX_PAGE_SIZE};
use uuid::Uuid;

struct Fixture {
    service: ConversationService,
    roster: Arc<InMemoryRoster>,
    catalog: Arc<InMemoryCatalog>,
    student: Participant,
    supervisor: Participant,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let roster = Arc::new(InMemoryRoster::new());
    let catalog = Arc::new(InMemoryCatalog::new());

    let student = Participant {
        id: Uuid::new_v4(),
        role: ParticipantRole::Student,
    };
    let supervisor = Participant {
        id: Uuid::new_v4(),
        role: ParticipantRole::Supervisor,
    };
    roster.enroll(student.id, student.role);
    roster.enroll(supervisor.id, supervisor.role);

    let service = ConversationService::new(
        store.clone(),
        store,
        roster.clone(),
        catalog.clone(),
        catalog.clone(),
    );
    Fixture {
        service,
        roster,
        catalog,
        student,
        supervisor,
    }
}

fn text(content: &str) -> MessageDraft {
    MessageDraft {
        content: content.to_string(),
        kind: DraftKind::Text,
    }
}

#[tokio::test]
async fn get_or_create_returns_the_same_conversation_from_both_directions() {
    let fx = fixture();

    let from_student = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .expect("student side should open the conversation");
    let from_supervisor = fx
        .service
        .get_or_create_conversation(&fx.supervisor, fx.student.id)
        .await
        .expect("supervisor side should find the same conversation");

    assert_eq!(from_student.id, from_supervisor.id);
    assert_eq!(from_student.student_id, fx.student.id);
    assert_eq!(from_student.supervisor_id, fx.supervisor.id);
    assert!(from_student.last_message_at.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_contacts_create_exactly_one_conversation() {
    let fx = fixture();
    let service = fx.service.clone();

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        let (caller, counterpart_id) = if i % 2 == 0 {
            (fx.student, fx.supervisor.id)
        } else {
            (fx.supervisor, fx.student.id)
        };
        handles.push(tokio::spawn(async move {
            service
                .get_or_create_conversation(&caller, counterpart_id)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let conversation = handle
            .await
            .expect("task should not panic")
            .expect("every call should succeed");
        ids.push(conversation.id);
    }

    let first = ids[0];
    assert!(ids.iter().all(|id| *id == first));

    let overview = fx
        .service
        .list_conversations(fx.student.id)
        .await
        .expect("overview should load");
    assert_eq!(overview.len(), 1);
}

#[tokio::test]
async fn unknown_or_wrong_role_counterpart_is_not_found() {
    let fx = fixture();

    let err = fx
        .service
        .get_or_create_conversation(&fx.student, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Another student is a known user but not a valid counterpart.
    let peer = Uuid::new_v4();
    fx.roster.enroll(peer, ParticipantRole::Student);
    let err = fx
        .service
        .get_or_create_conversation(&fx.student, peer)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn opening_a_conversation_with_yourself_is_rejected() {
    let fx = fixture();
    let err = fx
        .service
        .get_or_create_conversation(&fx.student, fx.student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn sending_advances_the_conversation_timestamp() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let message = fx
        .service
        .send_message(conversation.id, &fx.student, text("First!"))
        .await
        .expect("send should succeed");
    assert_eq!(message.conversation_id, conversation.id);
    assert!(!message.is_read);

    let refreshed = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();
    assert_eq!(refreshed.last_message_at, Some(message.created_at));
}

#[tokio::test]
async fn messages_come_back_in_chronological_order() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    for i in 0..5 {
        fx.service
            .send_message(conversation.id, &fx.student, text(&format!("msg {}", i)))
            .await
            .unwrap();
    }

    let page = fx
        .service
        .list_messages(conversation.id, fx.supervisor.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    for pair in page.items.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
        assert!(pair[0].id < pair[1].id);
    }
}

#[tokio::test]
async fn concatenated_pages_reproduce_the_full_log() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    for i in 0..7 {
        fx.service
            .send_message(conversation.id, &fx.student, text(&format!("msg {}", i)))
            .await
            .unwrap();
    }

    let full = fx
        .service
        .list_messages(conversation.id, fx.student.id, Some(1), Some(100))
        .await
        .unwrap();
    assert_eq!(full.items.len(), 7);
    assert!(!full.has_more);

    let mut walked = Vec::new();
    for page_no in 1..=3 {
        let page = fx
            .service
            .list_messages(conversation.id, fx.student.id, Some(page_no), Some(3))
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.has_more, page_no < 3);
        walked.extend(page.items);
    }
    assert_eq!(walked, full.items);
}

#[tokio::test]
async fn pagination_parameters_are_validated_and_clamped() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let err = fx
        .service
        .list_messages(conversation.id, fx.student.id, Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = fx
        .service
        .list_messages(conversation.id, fx.student.id, None, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let page = fx
        .service
        .list_messages(conversation.id, fx.student.id, None, Some(500))
        .await
        .unwrap();
    assert_eq!(page.page_size, MAX_PAGE_SIZE);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_skips_own_messages() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    fx.service
        .send_message(conversation.id, &fx.student, text("from student 1"))
        .await
        .unwrap();
    fx.service
        .send_message(conversation.id, &fx.student, text("from student 2"))
        .await
        .unwrap();
    fx.service
        .send_message(conversation.id, &fx.supervisor, text("from supervisor"))
        .await
        .unwrap();

    // The supervisor reads: only the student's two messages flip.
    let updated = fx
        .service
        .mark_messages_as_read(conversation.id, fx.supervisor.id)
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let page = fx
        .service
        .list_messages(conversation.id, fx.supervisor.id, None, None)
        .await
        .unwrap();
    let read_states: Vec<(Uuid, bool)> = page
        .items
        .iter()
        .map(|m| (m.sender_id, m.is_read))
        .collect();
    assert_eq!(
        read_states,
        vec![
            (fx.student.id, true),
            (fx.student.id, true),
            (fx.supervisor.id, false),
        ]
    );
    let first_read_at = page.items[0].read_at;
    assert!(first_read_at.is_some());

    // Second pass changes nothing, including the timestamps.
    let updated = fx
        .service
        .mark_messages_as_read(conversation.id, fx.supervisor.id)
        .await
        .unwrap();
    assert_eq!(updated, 0);
    let page = fx
        .service
        .list_messages(conversation.id, fx.supervisor.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.items[0].read_at, first_read_at);
}

#[tokio::test]
async fn tag_snapshots_do_not_follow_later_edits() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let document_id = Uuid::new_v4();
    fx.catalog.insert(
        TagKind::Document,
        document_id,
        fx.student.id,
        "Literature review v1",
        Some("Draft chapter"),
        Some("submitted"),
    );

    let draft = MessageDraft {
        content: "Please look at this draft".to_string(),
        kind: DraftKind::Tag(TagRef {
            kind: TagKind::Document,
            id: document_id,
        }),
    };
    let sent = fx
        .service
        .send_message(conversation.id, &fx.student, draft)
        .await
        .unwrap();
    assert_eq!(sent.kind.message_type(), MessageType::DocumentTag);

    fx.catalog
        .set_title(TagKind::Document, document_id, "Literature review v2");

    let page = fx
        .service
        .list_messages(conversation.id, fx.supervisor.id, None, None)
        .await
        .unwrap();
    match &page.items[0].kind {
        fyp_chat_core::domain::MessageKind::Tag { snapshot, .. } => {
            assert_eq!(snapshot.title, "Literature review v1");
            assert_eq!(snapshot.status.as_deref(), Some("submitted"));
        }
        other => panic!("expected a tag message, got {:?}", other),
    }
}

#[tokio::test]
async fn unresolvable_tags_write_nothing() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let draft = MessageDraft {
        content: "Tagging a ghost".to_string(),
        kind: DraftKind::Tag(TagRef {
            kind: TagKind::Task,
            id: Uuid::new_v4(),
        }),
    };
    let err = fx
        .service
        .send_message(conversation.id, &fx.student, draft)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let page = fx
        .service
        .list_messages(conversation.id, fx.student.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_write() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let err = fx
        .service
        .send_message(conversation.id, &fx.student, text("   \n\t "))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let page = fx
        .service
        .list_messages(conversation.id, fx.student.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn attachment_captions_fall_back_to_the_file_name() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    let draft = MessageDraft {
        content: String::new(),
        kind: DraftKind::Attachment {
            kind: AttachmentKind::File,
            url: "uploads/thesis-draft.pdf".to_string(),
            name: "thesis-draft.pdf".to_string(),
        },
    };
    let sent = fx
        .service
        .send_message(conversation.id, &fx.student, draft)
        .await
        .unwrap();
    assert_eq!(sent.content, "thesis-draft.pdf");
    assert_eq!(sent.kind.message_type(), MessageType::File);
}

#[tokio::test]
async fn non_participants_are_forbidden_everywhere() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();
    fx.service
        .send_message(conversation.id, &fx.student, text("hello"))
        .await
        .unwrap();

    let outsider = Participant {
        id: Uuid::new_v4(),
        role: ParticipantRole::Student,
    };
    fx.roster.enroll(outsider.id, outsider.role);

    let err = fx
        .service
        .list_messages(conversation.id, outsider.id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = fx
        .service
        .send_message(conversation.id, &outsider, text("let me in"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = fx
        .service
        .mark_messages_as_read(conversation.id, outsider.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = fx
        .service
        .search_messages(conversation.id, outsider.id, "hello", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn a_participant_id_with_the_wrong_role_cannot_send() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    // The supervisor's id claiming the student slot.
    let imposter = Participant {
        id: fx.supervisor.id,
        role: ParticipantRole::Student,
    };
    let err = fx
        .service
        .send_message(conversation.id, &imposter, text("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn search_matches_substrings_case_insensitively() {
    let fx = fixture();
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();

    fx.service
        .send_message(conversation.id, &fx.student, text("Draft ready for Review"))
        .await
        .unwrap();
    fx.service
        .send_message(
            conversation.id,
            &fx.supervisor,
            MessageDraft {
                content: "annotated review notes".to_string(),
                kind: DraftKind::Attachment {
                    kind: AttachmentKind::File,
                    url: "uploads/notes.pdf".to_string(),
                    name: "notes.pdf".to_string(),
                },
            },
        )
        .await
        .unwrap();

    let matches = fx
        .service
        .search_messages(conversation.id, fx.student.id, "REVIEW", None)
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches[0].created_at <= matches[1].created_at);

    let only_files = fx
        .service
        .search_messages(
            conversation.id,
            fx.student.id,
            "review",
            Some(MessageType::File),
        )
        .await
        .unwrap();
    assert_eq!(only_files.len(), 1);
    assert_eq!(only_files[0].content, "annotated review notes");

    let none = fx
        .service
        .search_messages(conversation.id, fx.student.id, "no such text", None)
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = fx
        .service
        .search_messages(conversation.id, fx.student.id, "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn student_and_supervisor_walk_the_whole_exchange() {
    let fx = fixture();

    // No prior contact: the conversation is created lazily.
    let conversation = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();
    assert!(conversation.last_message_at.is_none());

    let sent = fx
        .service
        .send_message(conversation.id, &fx.student, text("Hello"))
        .await
        .unwrap();

    let refreshed = fx
        .service
        .get_or_create_conversation(&fx.supervisor, fx.student.id)
        .await
        .unwrap();
    assert_eq!(refreshed.id, conversation.id);
    assert_eq!(refreshed.last_message_at, Some(sent.created_at));

    let supervisor_view = fx
        .service
        .list_messages(conversation.id, fx.supervisor.id, Some(1), Some(50))
        .await
        .unwrap();
    assert_eq!(supervisor_view.items.len(), 1);
    assert!(!supervisor_view.items[0].is_read);

    fx.service
        .mark_messages_as_read(conversation.id, fx.supervisor.id)
        .await
        .unwrap();

    let student_view = fx
        .service
        .list_messages(conversation.id, fx.student.id, None, None)
        .await
        .unwrap();
    assert!(student_view.items[0].is_read);
    assert!(student_view.items[0].read_at.is_some());
}

#[tokio::test]
async fn the_overview_sorts_by_activity_and_counts_unread() {
    let fx = fixture();
    let second_supervisor = Participant {
        id: Uuid::new_v4(),
        role: ParticipantRole::Supervisor,
    };
    fx.roster.enroll(second_supervisor.id, second_supervisor.role);

    let first = fx
        .service
        .get_or_create_conversation(&fx.student, fx.supervisor.id)
        .await
        .unwrap();
    let second = fx
        .service
        .get_or_create_conversation(&fx.student, second_supervisor.id)
        .await
        .unwrap();

    fx.service
        .send_message(first.id, &fx.supervisor, text("two unread"))
        .await
        .unwrap();
    fx.service
        .send_message(first.id, &fx.supervisor, text("for the student"))
        .await
        .unwrap();
    fx.service
        .send_message(second.id, &second_supervisor, text("one, but newer"))
        .await
        .unwrap();

    let overview = fx.service.list_conversations(fx.student.id).await.unwrap();
    assert_eq!(overview.len(), 2);
    assert_eq!(overview[0].conversation.id, second.id);
    assert_eq!(overview[0].unread, 1);
    assert_eq!(overview[1].conversation.id, first.id);
    assert_eq!(overview[1].unread, 2);

    // The student's own messages never count against them.
    fx.service
        .send_message(first.id, &fx.student, text("reply"))
        .await
        .unwrap();
    let overview = fx.service.list_conversations(fx.student.id).await.unwrap();
    assert_eq!(overview[0].conversation.id, first.id);
    assert_eq!(overview[0].unread, 2);
}

#[tokio::test]
async fn taggable_listings_are_scoped_to_the_caller() {
    let fx = fixture();

    fx.catalog.insert(
        TagKind::Document,
        Uuid::new_v4(),
        fx.student.id,
        "Proposal",
        None,
        Some("approved"),
    );
    fx.catalog.insert(
        TagKind::Task,
        Uuid::new_v4(),
        fx.student.id,
        "Collect survey data",
        Some("By week 6"),
        Some("in_progress"),
    );
    fx.catalog.insert(
        TagKind::Document,
        Uuid::new_v4(),
        fx.supervisor.id,
        "Marking rubric",
        None,
        None,
    );

    let items = fx.service.list_taggable_items(fx.student.id).await.unwrap();
    assert_eq!(items.documents.len(), 1);
    assert_eq!(items.documents[0].title, "Proposal");
    assert_eq!(items.tasks.len(), 1);
    assert!(items.milestones.is_empty());
}
