use tokio::time::{Duration, timeout};
use util::ws::{staff_room, ticket_room};

use super::{RecordingNotifier, setup_world};
use crate::services::dispatcher::dispatch_effects;
use crate::services::tickets::{
    CreateTicket, PostMessage, PostOutcome, create_ticket, post_message,
};

async fn recv_json(rx: &mut tokio::sync::broadcast::Receiver<String>) -> serde_json::Value {
    let raw = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("no broadcast within 100ms")
        .expect("room channel closed");
    serde_json::from_str(&raw).expect("broadcast is not JSON")
}

#[tokio::test]
async fn ticket_creation_reaches_staff_room_and_notifies_staff() {
    let world = setup_world().await;
    let notifier = RecordingNotifier::new();
    let mut staff_rx = world.state.ws().subscribe(staff_room()).await;

    let outcome = create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: "printer on fire".into(),
            body: None,
            attachments: Vec::new(),
        },
    )
    .await
    .unwrap();
    dispatch_effects(&world.state, &notifier, outcome.effects).await;

    let event = recv_json(&mut staff_rx).await;
    assert_eq!(event["type"], "event");
    assert_eq!(event["event"], "tickets_reload");
    assert_eq!(event["room"], "staff");

    assert_eq!(notifier.staff_note_count(), 1);
    let staff_notes = notifier.staff_notes.lock().unwrap();
    assert!(staff_notes[0].body.contains("printer on fire"));
}

#[tokio::test]
async fn staff_reply_broadcasts_message_and_status_to_the_ticket_room() {
    let world = setup_world().await;
    let notifier = RecordingNotifier::new();

    let ticket = create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: "vpn drops".into(),
            body: Some("every hour".into()),
            attachments: Vec::new(),
        },
    )
    .await
    .unwrap()
    .ticket;

    let room = ticket_room(ticket.id);
    let mut room_rx = world.state.ws().subscribe(&room).await;

    let outcome = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.moderator),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("restarting the gateway".into()),
            attachments: Vec::new(),
            dedup_key: None,
        },
    )
    .await
    .unwrap();
    let PostOutcome::Posted { effects, .. } = outcome else {
        panic!("expected a posted message");
    };
    dispatch_effects(&world.state, &notifier, effects).await;

    let message_event = recv_json(&mut room_rx).await;
    assert_eq!(message_event["event"], "receive_message");
    assert_eq!(message_event["room"], room);
    assert_eq!(
        message_event["payload"]["body"],
        "restarting the gateway"
    );
    assert_eq!(message_event["payload"]["sender_username"], "mallory");

    // The auto-progress to in_progress follows on the same room.
    let status_event = recv_json(&mut room_rx).await;
    assert_eq!(status_event["event"], "ticket_status_update");
    assert_eq!(status_event["payload"]["status"], "in_progress");

    // Requester was not watching the room, so they get a push.
    assert_eq!(notifier.user_note_count(), 1);
    let notes = notifier.user_notes.lock().unwrap();
    assert_eq!(notes[0].0, world.requester.id);
}

#[tokio::test]
async fn push_is_suppressed_while_the_recipient_watches_the_room() {
    let world = setup_world().await;
    let notifier = RecordingNotifier::new();

    let ticket = create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: "watching".into(),
            body: None,
            attachments: Vec::new(),
        },
    )
    .await
    .unwrap()
    .ticket;

    let room = ticket_room(ticket.id);
    let _rx = world.state.ws().subscribe(&room).await;
    world.state.ws().register(&room, world.requester.id).await;

    let outcome = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.moderator),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("you there?".into()),
            attachments: Vec::new(),
            dedup_key: None,
        },
    )
    .await
    .unwrap();
    let PostOutcome::Posted { effects, .. } = outcome else {
        panic!("expected a posted message");
    };
    dispatch_effects(&world.state, &notifier, effects).await;

    assert_eq!(
        notifier.user_note_count(),
        0,
        "no push while the requester has a socket in the room"
    );

    world.state.ws().unregister(&room, world.requester.id).await;
}

#[tokio::test]
async fn requester_message_on_unassigned_ticket_pings_all_staff() {
    let world = setup_world().await;
    let notifier = RecordingNotifier::new();
    let ticket = create_ticket(
        world.db(),
        world.ctx_for(&world.requester),
        CreateTicket {
            subject: "anyone?".into(),
            body: None,
            attachments: Vec::new(),
        },
    )
    .await
    .unwrap()
    .ticket;

    let outcome = post_message(
        world.db(),
        world.state.dedup(),
        world.ctx_for(&world.requester),
        PostMessage {
            ticket_id: ticket.id,
            body: Some("hello?".into()),
            attachments: Vec::new(),
            dedup_key: None,
        },
    )
    .await
    .unwrap();
    let PostOutcome::Posted { effects, .. } = outcome else {
        panic!("expected a posted message");
    };
    dispatch_effects(&world.state, &notifier, effects).await;

    assert_eq!(notifier.staff_note_count(), 1);
    assert_eq!(notifier.user_note_count(), 0);
}
