// Application orchestrator: the event loop that owns the reconciler.
//
// Commands arrive on `cmd_rx`. Each dispatched mutation runs on its own task
// and reports back on an internal completion channel, so a slow write for one
// bill never holds up another. Display changes go out on `ui_tx`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{Completion, Notification, UiUpdate, UserCommand};
use crate::reconciler::{Dispatch, Effect, Reconciler};
use crate::remote::{apply_with_retry, MutationRemote, RetryPolicy};

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the reconciler event loop until `Quit` or the command channel closes.
///
/// Mutations still in flight at shutdown finish on their own tasks; their
/// results are dropped.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut reconciler: Reconciler,
    remote: Arc<dyn MutationRemote>,
    retry: RetryPolicy,
) -> anyhow::Result<()> {
    info!("Reconciler event loop started for user {}", reconciler.user().id);

    let (done_tx, mut done_rx) = mpsc::channel::<Completion>(COMPLETION_CHANNEL_CAPACITY);

    loop {
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        let effects = handle_user_command(&mut reconciler, cmd);
                        perform(effects, &ui_tx, &done_tx, &remote, retry).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Mutation results ---
            // The loop holds `done_tx`, so this channel never closes.
            Some(done) = done_rx.recv() => {
                let effects = reconciler.complete(&done.key, done.generation, done.result);
                perform(effects, &ui_tx, &done_tx, &remote, retry).await;
            }
        }
    }

    info!("Reconciler event loop exiting");
    Ok(())
}

fn handle_user_command(reconciler: &mut Reconciler, cmd: UserCommand) -> Vec<Effect> {
    let result = match cmd {
        UserCommand::Attach { bill_id, initial } => Ok(reconciler.attach(&bill_id, initial)),
        UserCommand::ToggleVote { bill_id, vote_type } => reconciler.toggle_vote(&bill_id, vote_type),
        UserCommand::ToggleSave { bill_id } => reconciler.toggle_save(&bill_id),
        UserCommand::Detach(key) => Ok(reconciler.detach(&key)),
        UserCommand::Quit => Ok(Vec::new()),
    };
    result.unwrap_or_else(|err| {
        warn!("Rejected command: {err}");
        vec![Effect::Ui(UiUpdate::Notify(Notification::error(err.to_string())))]
    })
}

async fn perform(
    effects: Vec<Effect>,
    ui_tx: &mpsc::Sender<UiUpdate>,
    done_tx: &mpsc::Sender<Completion>,
    remote: &Arc<dyn MutationRemote>,
    retry: RetryPolicy,
) {
    for effect in effects {
        match effect {
            Effect::Ui(update) => {
                let _ = ui_tx.send(update).await;
            }
            Effect::Dispatch(dispatch) => spawn_mutation(dispatch, done_tx.clone(), Arc::clone(remote), retry),
        }
    }
}

fn spawn_mutation(
    dispatch: Dispatch,
    done_tx: mpsc::Sender<Completion>,
    remote: Arc<dyn MutationRemote>,
    retry: RetryPolicy,
) {
    debug!("Dispatching {:?} for {} (gen {})", dispatch.mutation, dispatch.key, dispatch.generation);
    tokio::spawn(async move {
        let result = apply_with_retry(
            remote.as_ref(),
            retry,
            &dispatch.user_id,
            &dispatch.key.bill_id,
            dispatch.mutation,
        )
        .await;
        // Receiver gone means the loop has exited; nothing left to update.
        let _ = done_tx
            .send(Completion {
                key: dispatch.key,
                generation: dispatch.generation,
                result,
            })
            .await;
    });
}
