use db::models::{
    message_attachments, messages, status_history,
    status_history::AuditEvent,
    tickets::{self, TicketStatus},
    user::{self, Role},
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, TransactionTrait};

use super::setup_world;
use crate::services::tickets::{
    AutoAssignTrigger, CreateTicket, PostMessage, PostOutcome, ServiceError, UploadedFile,
    assign_ticket, change_status, create_ticket, decide_auto_assign, format_time_spent,
    list_messages, post_message, role_may_set,
};

fn text_message(ticket_id: i64, body: &str) -> PostMessage {
    PostMessage {
        ticket_id,
        body: Some(body.to_string()),
        attachments: Vec::new(),
        dedup_key: None,
    }
}

fn upload(name: &str, stored: &str) -> UploadedFile {
    UploadedFile {
        original_name: name.to_string(),
        url: format!("/uploads/{stored}"),
        mime_type: Some("image/png".to_string()),
        size_bytes: Some(1024),
    }
}

async fn open_ticket(world: &super::TestWorld, subject: &str) -> tickets::Model {
    create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: subject.to_string(),
            body: Some("It broke".to_string()),
            attachments: Vec::new(),
        },
    )
    .await
    .unwrap()
    .ticket
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_rows() {
    let world = setup_world().await;

    let txn = world.db().begin().await.unwrap();
    let ticket = tickets::Model::create(&txn, world.requester.id, "doomed")
        .await
        .unwrap();
    messages::Model::create(&txn, ticket.id, world.requester.id, "never lands")
        .await
        .unwrap();
    txn.rollback().await.unwrap();

    assert_eq!(
        tickets::Entity::find().count(world.db()).await.unwrap(),
        0,
        "rollback must drop the ticket row"
    );
    assert_eq!(messages::Entity::find().count(world.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn failing_attachment_insert_rolls_back_the_whole_send() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "broken storage").await;
    let before = messages::Entity::find().count(world.db()).await.unwrap();

    // Make the attachment insert fail mid-transaction, after the message row.
    world
        .db()
        .execute_unprepared(
            "CREATE TRIGGER reject_attachments BEFORE INSERT ON message_attachments \
             BEGIN SELECT RAISE(ABORT, 'attachment rejected'); END;",
        )
        .await
        .unwrap();

    let result = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("with a file".into()),
            attachments: vec![upload("crash.png", "file-0-ee.png")],
            dedup_key: None,
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Db(_))));

    // The message row inserted before the failure must be gone too.
    assert_eq!(
        messages::Entity::find().count(world.db()).await.unwrap(),
        before
    );
    assert_eq!(
        message_attachments::Entity::find()
            .count(world.db())
            .await
            .unwrap(),
        0
    );
}

#[test]
fn status_role_gate_matrix() {
    use TicketStatus::*;
    let all = [New, InProgress, OnHold, Successful, Rejected];

    for status in all {
        assert!(role_may_set(Role::Admin, status), "admin may set {status}");
        assert!(!role_may_set(Role::User, status), "user may set nothing");
    }
    assert!(role_may_set(Role::Moderator, InProgress));
    assert!(role_may_set(Role::Moderator, OnHold));
    assert!(!role_may_set(Role::Moderator, New));
    assert!(!role_may_set(Role::Moderator, Successful));
    assert!(!role_may_set(Role::Moderator, Rejected));
}

#[tokio::test]
async fn moderator_may_not_close_a_ticket() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "close me").await;

    let result = change_status(
        world.db(),
        world.ctx_for(&world.moderator),
        ticket.id,
        TicketStatus::Successful,
    )
    .await;

    assert!(matches!(result, Err(ServiceError::Authorization(_))));

    let unchanged = tickets::Entity::find_by_id(ticket.id)
        .one(world.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.status, TicketStatus::New);
}

#[tokio::test]
async fn requester_may_not_change_status() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "hands off").await;

    let result = change_status(
        world.db(),
        world.ctx_for(&world.requester),
        ticket.id,
        TicketStatus::InProgress,
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Authorization(_))));
}

#[tokio::test]
async fn admin_may_set_every_status() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "admin powers").await;

    use TicketStatus::*;
    for status in [InProgress, OnHold, Successful, Rejected, New] {
        let outcome = change_status(world.db(), world.ctx_for(&world.admin), ticket.id, status)
            .await
            .unwrap();
        assert_eq!(outcome.ticket.status, status);
    }
}

#[tokio::test]
async fn first_staff_reply_claims_the_ticket_and_stays_claimed() {
    let world = setup_world().await;
    let second_mod =
        user::Model::create(world.db(), "morgan", "password123", Role::Moderator, None, None)
            .await
            .unwrap();
    let ticket = open_ticket(&world, "unclaimed").await;

    let outcome = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.moderator),
        text_message(ticket.id, "looking into it"),
    )
    .await
    .unwrap();
    let PostOutcome::Posted { new_status, .. } = outcome else {
        panic!("expected a posted message");
    };
    assert_eq!(new_status, Some(TicketStatus::InProgress));

    let claimed = tickets::Entity::find_by_id(ticket.id)
        .one(world.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.assigned_to, Some(world.moderator.id));
    assert_eq!(claimed.status, TicketStatus::InProgress);

    // A later reply from different staff must not steal the ticket.
    post_message(
        world.db(),
        world.state.dedup(),
        super::ServiceContext::new(second_mod.id, second_mod.role),
        text_message(ticket.id, "me too"),
    )
    .await
    .unwrap();

    let still_claimed = tickets::Entity::find_by_id(ticket.id)
        .one(world.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_claimed.assigned_to, Some(world.moderator.id));
}

#[test]
fn auto_assign_never_overrides_an_assignee() {
    let ticket = tickets::Model {
        id: 1,
        user_id: 10,
        assigned_to: Some(77),
        subject: "taken".into(),
        status: TicketStatus::New,
        created_at: chrono::Utc::now(),
        closed_at: None,
    };
    assert_eq!(
        decide_auto_assign(&ticket, 42, Role::Moderator, AutoAssignTrigger::StaffReply),
        None
    );
}

#[test]
fn auto_assign_on_status_change_only_applies_to_moderators_leaving_new() {
    let ticket = tickets::Model {
        id: 1,
        user_id: 10,
        assigned_to: None,
        subject: "fresh".into(),
        status: TicketStatus::New,
        created_at: chrono::Utc::now(),
        closed_at: None,
    };

    assert_eq!(
        decide_auto_assign(
            &ticket,
            42,
            Role::Moderator,
            AutoAssignTrigger::StatusChange {
                old_status: TicketStatus::New
            }
        ),
        Some(42)
    );
    assert_eq!(
        decide_auto_assign(
            &ticket,
            42,
            Role::Admin,
            AutoAssignTrigger::StatusChange {
                old_status: TicketStatus::New
            }
        ),
        None
    );
    assert_eq!(
        decide_auto_assign(
            &ticket,
            42,
            Role::Moderator,
            AutoAssignTrigger::StatusChange {
                old_status: TicketStatus::OnHold
            }
        ),
        None
    );
}

#[tokio::test]
async fn duplicate_send_within_window_writes_nothing() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "twitchy finger").await;
    let before = messages::Entity::find().count(world.db()).await.unwrap();

    let first = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(ticket.id, "did you see this?"),
    )
    .await
    .unwrap();
    assert!(matches!(first, PostOutcome::Posted { .. }));

    let second = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(ticket.id, "did you see this?"),
    )
    .await
    .unwrap();
    assert!(matches!(second, PostOutcome::Duplicate));

    let after = messages::Entity::find().count(world.db()).await.unwrap();
    assert_eq!(after, before + 1, "only the first send may land");
}

#[tokio::test]
async fn failed_send_does_not_shadow_its_retry() {
    let world = setup_world().await;

    let first = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(424242, "anyone there?"),
    )
    .await;
    assert!(matches!(first, Err(ServiceError::NotFound(_))));

    // The retry must surface the same error, not a duplicate acknowledgement.
    let retry = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(424242, "anyone there?"),
    )
    .await;
    assert!(matches!(retry, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn identical_text_after_window_expiry_is_a_new_message() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "slow repeat").await;

    post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(ticket.id, "status?"),
    )
    .await
    .unwrap();

    // World uses an 80ms window.
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    let resent = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(ticket.id, "status?"),
    )
    .await
    .unwrap();
    assert!(matches!(resent, PostOutcome::Posted { .. }));
}

#[tokio::test]
async fn three_attachments_become_three_rows() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "screenshots").await;

    let input = PostMessage {
        ticket_id: ticket.id,
        body: None,
        attachments: vec![
            upload("one.png", "file-1-aa.png"),
            upload("two.png", "file-2-bb.png"),
            upload("three.png", "file-3-cc.png"),
        ],
        dedup_key: None,
    };
    let outcome = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        input,
    )
    .await
    .unwrap();

    let PostOutcome::Posted { message, .. } = outcome else {
        panic!("expected a posted message");
    };
    assert_eq!(message.attachments.len(), 3);

    let rows = message_attachments::Model::find_for_message(world.db(), message.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.message_id == message.id));
}

#[tokio::test]
async fn message_requires_text_or_attachment() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "empty send").await;

    let result = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("   ".to_string()),
            attachments: Vec::new(),
            dedup_key: None,
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn outsider_may_not_read_or_post() {
    let world = setup_world().await;
    let stranger = user::Model::create(world.db(), "eve", "password123", Role::User, None, None)
        .await
        .unwrap();
    let ticket = open_ticket(&world, "private matter").await;

    let ctx = super::ServiceContext::new(stranger.id, stranger.role);
    let read = list_messages(world.db(), ctx, ticket.id).await;
    assert!(matches!(read, Err(ServiceError::Authorization(_))));

    let write = post_message(
        world.db(),
        world.state.dedup(),
        ctx,
        text_message(ticket.id, "let me in"),
    )
    .await;
    assert!(matches!(write, Err(ServiceError::Authorization(_))));
}

#[tokio::test]
async fn closing_stamps_closed_at_and_reopening_clears_it() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "lifecycle").await;

    let closed = change_status(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        TicketStatus::Successful,
    )
    .await
    .unwrap();
    assert!(closed.ticket.closed_at.is_some());
    assert_eq!(closed.time_spent.as_deref(), Some("0d 0h 0m"));

    // A staff reply on a closed ticket reopens it.
    post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.moderator),
        text_message(ticket.id, "actually, one more thing"),
    )
    .await
    .unwrap();

    let reopened = tickets::Entity::find_by_id(ticket.id)
        .one(world.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reopened.status, TicketStatus::InProgress);
    assert!(reopened.closed_at.is_none());
}

#[tokio::test]
async fn non_closing_statuses_never_carry_closed_at() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "hold it").await;

    change_status(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        TicketStatus::Rejected,
    )
    .await
    .unwrap();
    let outcome = change_status(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        TicketStatus::OnHold,
    )
    .await
    .unwrap();
    assert!(outcome.ticket.closed_at.is_none());
    assert!(outcome.time_spent.is_none());
}

#[test]
fn time_spent_renders_days_hours_minutes() {
    let opened = chrono::Utc::now();
    let closed = opened + chrono::Duration::days(2) + chrono::Duration::minutes(4 * 60 + 13);
    assert_eq!(format_time_spent(opened, closed), "2d 4h 13m");
    assert_eq!(format_time_spent(opened, opened), "0d 0h 0m");
}

#[tokio::test]
async fn audit_log_records_creation_transitions_and_assignment() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "paper trail").await;

    change_status(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        TicketStatus::OnHold,
    )
    .await
    .unwrap();
    assign_ticket(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        world.moderator.id,
    )
    .await
    .unwrap();

    let trail = status_history::Model::find_for_ticket(world.db(), ticket.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);

    assert_eq!(trail[0].old_status, None);
    assert_eq!(trail[0].new_status, "new");
    assert_eq!(trail[0].event, AuditEvent::StatusChange);

    assert_eq!(trail[1].old_status.as_deref(), Some("new"));
    assert_eq!(trail[1].new_status, "on_hold");

    assert_eq!(trail[2].event, AuditEvent::Assignment);
    assert_eq!(trail[2].old_status.as_deref(), Some("on_hold"));
    assert_eq!(trail[2].new_status, "on_hold");
}

#[tokio::test]
async fn assignment_requires_admin_and_a_moderator_assignee() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "hand me over").await;

    let by_moderator = assign_ticket(
        world.db(),
        world.ctx_for(&world.moderator),
        ticket.id,
        world.moderator.id,
    )
    .await;
    assert!(matches!(by_moderator, Err(ServiceError::Authorization(_))));

    let to_requester = assign_ticket(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        world.requester.id,
    )
    .await;
    assert!(matches!(to_requester, Err(ServiceError::Validation(_))));

    let (assigned, _) = assign_ticket(
        world.db(),
        world.ctx_for(&world.admin),
        ticket.id,
        world.moderator.id,
    )
    .await
    .unwrap();
    assert_eq!(assigned.assigned_to, Some(world.moderator.id));
}

#[tokio::test]
async fn transcript_is_chronological_with_nested_attachments() {
    let world = setup_world().await;
    let ticket = open_ticket(&world, "ordering").await;

    post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("with a file".into()),
            attachments: vec![upload("log.txt", "file-9-dd.txt")],
            dedup_key: None,
        },
    )
    .await
    .unwrap();
    post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.moderator),
        text_message(ticket.id, "thanks"),
    )
    .await
    .unwrap();

    let transcript = list_messages(world.db(), world.ctx_for(&world.requester), ticket.id)
        .await
        .unwrap();
    // Initial message from ticket creation plus the two above.
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].body, "It broke");
    assert_eq!(transcript[1].attachments.len(), 1);
    assert_eq!(transcript[2].sender_role, Role::Moderator);
    assert!(transcript[0].created_at <= transcript[2].created_at);
}

#[tokio::test]
async fn missing_ticket_is_not_found() {
    let world = setup_world().await;
    let result = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        text_message(424242, "hello?"),
    )
    .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn blank_subject_is_rejected() {
    let world = setup_world().await;
    let result = create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: "   ".into(),
            body: None,
            attachments: Vec::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}
