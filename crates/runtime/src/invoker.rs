//! Scheduling strategies (spec §4.4): the same controller and evaluator
//! logic is driven either by a single-threaded cooperative ready-queue or
//! by binding each runnable vmid to its own OS thread. Both terminate when
//! the controller reports `stopped` and satisfy the same observable
//! contract (spec §5).

use std::collections::VecDeque;
use std::sync::Mutex;

use stepwise_core::VmId;
use tracing::{debug, trace};

use crate::controller::Controller;
use crate::error::{RuntimeError, RuntimeResult};
use crate::evaluator;
use crate::machine::StepResult;
use crate::storage::Storage;

/// Drives `entrypoint` (and anything it transitively spawns or wakes) to
/// completion on a single execution unit, dequeuing from a FIFO ready
/// queue. Stepping is deterministic given queue order (spec §4.4).
pub fn run_cooperative<S: Storage>(controller: &Controller<S>, entrypoint: VmId) -> RuntimeResult<()> {
    debug!("cooperative invoker starting");
    let mut ready: VecDeque<VmId> = VecDeque::new();
    ready.push_back(entrypoint);

    while let Some(vmid) = ready.pop_front() {
        if controller.is_broken() {
            debug!("controller broken, declining to schedule remaining work");
            break;
        }
        let mut state = controller
            .storage()
            .get_state(vmid)
            .expect("runnable vmid must already have machine state");
        trace!(%vmid, ip = state.ip, "dequeued machine");

        loop {
            controller.record_step(vmid, state.ip)?;
            match evaluator::step(&mut state, controller) {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::Spawn { child }) => {
                    ready.push_back(child);
                    continue;
                }
                Ok(StepResult::Wait) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    break;
                }
                Ok(StepResult::Finish { value }) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    let continuations = controller.finish(vmid, value)?;
                    controller.stop(vmid, true);
                    ready.extend(continuations);
                    break;
                }
                Err(err) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    controller.stop(vmid, false);
                    if err.is_controller_invariant() {
                        return Err(err);
                    }
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Drives `entrypoint` using one OS thread per concurrently-runnable
/// machine. Spawned children and woken continuations get their own thread
/// in turn; `std::thread::scope` guarantees every descendant thread joins
/// before this function returns, so the controller can be borrowed rather
/// than shared via `Arc` (spec §4.4 "Parallel threads").
pub fn run_threaded<S: Storage>(controller: &Controller<S>, entrypoint: VmId) -> RuntimeResult<()> {
    let first_error: Mutex<Option<RuntimeError>> = Mutex::new(None);
    std::thread::scope(|scope| {
        drive_on_thread(scope, controller, entrypoint, &first_error);
    });
    match first_error.into_inner().unwrap() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn drive_on_thread<'scope, 'env, S>(
    scope: &'scope std::thread::Scope<'scope, 'env>,
    controller: &'env Controller<S>,
    vmid: VmId,
    first_error: &'env Mutex<Option<RuntimeError>>,
) where
    S: Storage,
{
    scope.spawn(move || {
        if controller.is_broken() {
            return;
        }
        let mut state = controller
            .storage()
            .get_state(vmid)
            .expect("runnable vmid must already have machine state");

        loop {
            match controller.record_step(vmid, state.ip) {
                Ok(()) => {}
                Err(err) => {
                    record_error(first_error, err);
                    return;
                }
            }
            match evaluator::step(&mut state, controller) {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::Spawn { child }) => {
                    drive_on_thread(scope, controller, child, first_error);
                    continue;
                }
                Ok(StepResult::Wait) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    return;
                }
                Ok(StepResult::Finish { value }) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    match controller.finish(vmid, value) {
                        Ok(continuations) => {
                            controller.stop(vmid, true);
                            for continuation in continuations {
                                drive_on_thread(scope, controller, continuation, first_error);
                            }
                        }
                        Err(err) => {
                            controller.stop(vmid, false);
                            record_error(first_error, err);
                        }
                    }
                    return;
                }
                Err(err) => {
                    controller.storage().with_state_mut(vmid, |s| *s = state.clone());
                    controller.stop(vmid, false);
                    record_error(first_error, err);
                    return;
                }
            }
        }
    });
}

fn record_error(slot: &Mutex<Option<RuntimeError>>, err: RuntimeError) {
    if err.is_controller_invariant() {
        let mut guard = slot.lock().unwrap();
        if guard.is_none() {
            *guard = Some(err);
        }
    }
}
