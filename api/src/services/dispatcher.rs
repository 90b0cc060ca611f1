//! Executes the side effects a service operation returned after its
//! transaction committed. Broadcasts and pushes are best effort: a failed
//! delivery is logged and never unwinds the already-committed change.

use util::state::AppState;
use util::ws::ticket_room;

use crate::services::notify::Notifier;
use crate::services::tickets::Effect;
use crate::ws::emit;

pub async fn dispatch_effects(state: &AppState, notifier: &dyn Notifier, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::BroadcastMessage(message) => {
                emit::receive_message(state.ws(), &message).await;
            }
            Effect::BroadcastStatus(payload) => {
                emit::ticket_status_update(state.ws(), &payload).await;
            }
            Effect::BroadcastTicketsReload => {
                emit::tickets_reload(state.ws()).await;
            }
            Effect::NotifyUser {
                user_id,
                ticket_id,
                payload,
            } => {
                // Someone watching the room already saw the broadcast.
                let room = ticket_room(ticket_id);
                if state.ws().is_user_present_in(&room, user_id).await {
                    continue;
                }
                notifier.notify_user(state.db(), user_id, &payload).await;
            }
            Effect::NotifyStaff { payload } => {
                notifier.notify_staff(state.db(), &payload).await;
            }
        }
    }
}
