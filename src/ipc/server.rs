//! IPC endpoint. One `UnixListener` with a 1 s accept
//! timeout; each accepted connection gets its own thread reading up to
//! 1024 bytes and replying with one JSON object (no length prefix).

use std::fs;
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam::channel::Receiver;
use log::{debug, error, info, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::{fchmod, Mode};
use nix::unistd::{chown, Group, User};
use serde_json::{json, Value};

use crate::bus::{Bus, BusMessage};
use crate::config::Config;
use crate::ipc::protocol::{self, Request, Response};
use crate::model::area::global_arm_state;
use crate::notifier::{email, sms};
use crate::output_signs::{OutputSignEngine, SignParams, TriggerKey, TriggerSource};
use crate::persistence::area_repo::AreaRepo;
use crate::persistence::db::open_connection;
use crate::persistence::option_repo::OptionRepo;
use crate::persistence::output_repo::OutputRepo;
use crate::siren::{SirenDriver, SirenDuration, SirenParams};
use crate::state_store::StateStore;

const READ_CHUNK: usize = 1024;
const ACCEPT_POLL_MS: u16 = 1000;

pub struct IpcServer {
    socket_path: String,
    permissions: Option<u32>,
    username: Option<String>,
    groupname: Option<String>,
    db_path: String,
    bus: Bus,
    state_store: StateStore,
    signs: Arc<OutputSignEngine>,
    siren: Arc<SirenDriver>,
    gsm_port: Option<String>,
    gsm_baud: u32,
}

impl IpcServer {
    pub fn new(
        config: &Config,
        bus: Bus,
        state_store: StateStore,
        signs: Arc<OutputSignEngine>,
        siren: Arc<SirenDriver>,
    ) -> std::io::Result<Self> {
        let server = IpcServer {
            socket_path: config.monitor_input_socket.clone(),
            permissions: config.socket_permissions,
            username: config.socket_username.clone(),
            groupname: config.socket_groupname.clone(),
            db_path: config.db_path.clone(),
            bus,
            state_store,
            signs,
            siren,
            gsm_port: config.gsm_port.clone(),
            gsm_baud: config.gsm_port_baud,
        };
        Ok(server)
    }

    fn bind(&self) -> std::io::Result<UnixListener> {
        if let Some(parent) = Path::new(&self.socket_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let _ = fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)?;
        self.fix_permissions(&listener);
        Ok(listener)
    }

    /// Sets socket ownership/permissions from configuration;
    /// absent env configuration just logs and leaves default permissions.
    fn fix_permissions(&self, listener: &UnixListener) {
        let (Some(perm), Some(user), Some(group)) = (&self.permissions, &self.username, &self.groupname) else {
            error!("failed to fix permission and/or owner: PERMISSIONS/USERNAME/GROUPNAME not set");
            return;
        };

        if let Err(err) = fchmod(listener.as_fd(), Mode::from_bits_truncate(*perm)) {
            error!("failed to chmod ipc socket: {err}");
            return;
        }

        let uid = User::from_name(user).ok().flatten().map(|u| u.uid);
        let gid = Group::from_name(group).ok().flatten().map(|g| g.gid);
        match (uid, gid) {
            (Some(uid), Some(gid)) => match chown(Path::new(&self.socket_path), Some(uid), Some(gid)) {
                Ok(()) => info!("socket permissions fixed"),
                Err(err) => error!("failed to chown ipc socket: {err}"),
            },
            _ => error!("failed to resolve USERNAME/GROUPNAME for ipc socket ownership"),
        }
    }

    /// Blocking main loop; run this on its own thread. `sub_rx` is
    /// polled (non-blocking) between accept-timeouts for `Stop`.
    pub fn run(&self, sub_rx: Receiver<BusMessage>, heartbeat: crate::supervisor::Heartbeat) {
        let listener = match self.bind() {
            Ok(listener) => listener,
            Err(err) => {
                error!("ipc server failed to bind {}: {err}", self.socket_path);
                return;
            }
        };
        info!("ipc server started on {}", self.socket_path);

        loop {
            heartbeat.beat();
            match sub_rx.try_recv() {
                Ok(BusMessage::Stop) => break,
                Ok(_) => {}
                Err(crossbeam::channel::TryRecvError::Empty) => {}
                Err(crossbeam::channel::TryRecvError::Disconnected) => break,
            }

            let mut pollfd = PollFd::new(listener.as_fd(), PollFlags::POLLIN);
            match poll(std::slice::from_mut(&mut pollfd), PollTimeout::from(ACCEPT_POLL_MS)) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!("ipc poll failed: {err}");
                    continue;
                }
            }

            match listener.accept() {
                Ok((stream, _addr)) => {
                    let ctx = self.handler_context();
                    thread::Builder::new()
                        .name("ipc-conn".into())
                        .spawn(move || handle_connection(stream, ctx))
                        .ok();
                }
                Err(err) => warn!("ipc accept failed: {err}"),
            }
        }

        let _ = fs::remove_file(&self.socket_path);
        info!("ipc server stopped");
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            db_path: self.db_path.clone(),
            bus: self.bus.clone(),
            state_store: self.state_store.clone(),
            signs: Arc::clone(&self.signs),
            siren: Arc::clone(&self.siren),
            gsm_port: self.gsm_port.clone(),
            gsm_baud: self.gsm_baud,
        }
    }
}

#[derive(Clone)]
struct HandlerContext {
    db_path: String,
    bus: Bus,
    state_store: StateStore,
    signs: Arc<OutputSignEngine>,
    siren: Arc<SirenDriver>,
    gsm_port: Option<String>,
    gsm_baud: u32,
}

fn handle_connection(mut stream: UnixStream, ctx: HandlerContext) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!("ipc connection read failed: {err}");
                break;
            }
        };

        let response = match serde_json::from_slice::<Request>(&buf[..n]) {
            Ok(request) => {
                debug!("ipc action received: {}", request.action);
                handle_action(&request, &ctx)
            }
            Err(err) => Response::err(format!("malformed request: {err}")),
        };

        let Ok(encoded) = serde_json::to_vec(&response) else {
            break;
        };
        if stream.write_all(&encoded).is_err() {
            break;
        }
    }
}

fn handle_action(request: &Request, ctx: &HandlerContext) -> Response {
    let action = request.action.as_str();

    if protocol::BROADCASTED_ACTIONS.contains(&action) {
        ctx.bus.publish(broadcast_message(action, request));
        return Response::ok();
    }

    match action {
        protocol::MONITOR_GET_ARM => handle_get_arm(ctx),
        protocol::MONITOR_GET_STATE => Response::ok_value(json!({
            "state": ctx.state_store.monitoring(),
        })),
        protocol::POWER_GET_STATE => Response::ok_value(json!({
            "state": ctx.state_store.power(),
        })),
        protocol::MONITOR_SYNC_CLOCK | protocol::MONITOR_SET_CLOCK => {
            // Setting the system clock is OS configuration, out of scope
            // for this core; acknowledge so the caller's IPC contract
            // is satisfied.
            Response::ok()
        }
        protocol::MONITOR_UPDATE_SECURE_CONNECTION | protocol::UPDATE_SSH => {
            // Certificate issuance and SSH/firewall management are
            // out of scope (Non-goals); acknowledge only.
            Response::ok()
        }
        protocol::MONITOR_ACTIVATE_OUTPUT => handle_output(ctx, request, true),
        protocol::MONITOR_DEACTIVATE_OUTPUT => handle_output(ctx, request, false),
        protocol::SEND_TEST_EMAIL => handle_test_email(ctx),
        protocol::SEND_TEST_SMS => handle_test_sms(ctx),
        protocol::SEND_TEST_SYREN => handle_test_syren(ctx, request),
        _ => Response::unknown_command(),
    }
}

fn broadcast_message(action: &str, request: &Request) -> BusMessage {
    let keypad_id = request.i64("keypad_id");
    let user_id = request.i64("user_id");
    match action {
        protocol::MONITOR_ARM_AWAY => BusMessage::ArmAway { keypad_id, user_id },
        protocol::MONITOR_ARM_STAY => BusMessage::ArmStay { keypad_id, user_id },
        protocol::MONITOR_DISARM => BusMessage::Disarm { keypad_id, user_id },
        protocol::MONITOR_UPDATE_KEYPAD => BusMessage::UpdateKeypad,
        protocol::MONITOR_REGISTER_CARD => BusMessage::RegisterCard { keypad_id },
        _ => BusMessage::UpdateConfig,
    }
}

fn handle_get_arm(ctx: &HandlerContext) -> Response {
    let conn = match open_connection(&ctx.db_path) {
        Ok(conn) => conn,
        Err(err) => return Response::err(format!("database error: {err}")),
    };
    let areas = AreaRepo::new(&conn).find_all().unwrap_or_default();
    let state = global_arm_state(&areas);
    Response::ok_value(json!({ "type": state }))
}

fn handle_output(ctx: &HandlerContext, request: &Request, active: bool) -> Response {
    let Some(output_id) = request.i64("output_id") else {
        return Response::err("output_id is required");
    };
    let conn = match open_connection(&ctx.db_path) {
        Ok(conn) => conn,
        Err(err) => return Response::err(format!("database error: {err}")),
    };
    let output = match OutputRepo::new(&conn).find_by_button(output_id) {
        Ok(Some(output)) => output,
        Ok(None) => return Response::err(format!("no such output: {output_id}")),
        Err(err) => return Response::err(format!("database error: {err}")),
    };

    let key = TriggerKey {
        source: TriggerSource::Button(output_id.to_string()),
    };
    if active {
        if output.enabled {
            ctx.signs.start(
                key,
                SignParams {
                    channel: output.channel,
                    default_state: output.default_state,
                    delay: Duration::from_secs(output.delay),
                    duration: output.duration.map(Duration::from_secs),
                },
            );
        }
    } else {
        ctx.signs.stop(&key);
    }
    Response::ok()
}

fn handle_test_syren(ctx: &HandlerContext, request: &Request) -> Response {
    let duration = request.u64("duration").unwrap_or(5);
    ctx.siren.start(SirenParams {
        silent: false,
        delay: Duration::from_secs(0),
        duration: SirenDuration::from_secs(duration),
    });
    Response::ok()
}

/// Sends to every configured address (email1/email2 from the `smtp` option).
fn handle_test_email(ctx: &HandlerContext) -> Response {
    let conn = match open_connection(&ctx.db_path) {
        Ok(conn) => conn,
        Err(err) => return Response::err(format!("database error: {err}")),
    };
    let smtp_option = OptionRepo::new(&conn).get("smtp", "smtp").unwrap_or(None);
    let Some(option) = smtp_option else {
        return Response::err("Error in email sending!").with_other(json!({ "connection": false }));
    };

    let settings = crate::notifier::queue::SmtpSettings {
        username: str_field(&option.value, "smtp_username"),
        password: str_field(&option.value, "smtp_password"),
        from_address: str_field(&option.value, "smtp_username"),
    };

    let mut results = serde_json::Map::new();
    let mut all_ok = true;
    for (key, addr_field) in [("email1", "email_address_1"), ("email2", "email_address_2")] {
        if let Some(address) = str_field(&option.value, addr_field) {
            let sent = email::send(&settings, &address, "Test Email", "This is a test email from your home security system!").is_ok();
            all_ok &= sent;
            results.insert(key.to_string(), Value::Bool(sent));
        }
    }

    if results.is_empty() {
        return Response::err("Error in email sending!").with_other(json!({ "connection": false }));
    }

    let mut response = if all_ok { Response::ok() } else { Response::err("Error in email sending!") };
    response.other = Some(Value::Object(results));
    response
}

fn handle_test_sms(ctx: &HandlerContext) -> Response {
    let conn = match open_connection(&ctx.db_path) {
        Ok(conn) => conn,
        Err(err) => return Response::err(format!("database error: {err}")),
    };
    let gsm_option = OptionRepo::new(&conn).get("gsm", "gsm").unwrap_or(None);
    let Some(option) = gsm_option else {
        return Response::err("Error in SMS sending!").with_other(json!({ "connection": false }));
    };

    let mut modem = sms::GsmModem::new(ctx.gsm_port.clone(), ctx.gsm_baud);
    let mut results = serde_json::Map::new();
    let mut all_ok = true;
    for (key, field) in [("phone1", "phone_number_1"), ("phone2", "phone_number_2")] {
        if let Some(number) = str_field(&option.value, field) {
            let sent = modem.send_sms(&number, "Test Message").is_ok();
            all_ok &= sent;
            results.insert(key.to_string(), Value::Bool(sent));
        }
    }

    if results.is_empty() {
        return Response::err("Error in SMS sending!").with_other(json!({ "connection": false }));
    }

    let mut response = if all_ok { Response::ok() } else { Response::err("Error in SMS sending!") };
    response.other = Some(Value::Object(results));
    response
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_is_rejected() {
        let req: Request = serde_json::from_str(r#"{"action": "bogus"}"#).unwrap();
        let ctx = test_ctx();
        let resp = handle_action(&req, &ctx);
        assert!(!resp.result);
        assert_eq!(resp.message.as_deref(), Some("Unknown command"));
    }

    #[test]
    fn broadcasted_action_is_acknowledged_and_forwarded() {
        let req: Request = serde_json::from_str(r#"{"action": "monitor_arm_away"}"#).unwrap();
        let ctx = test_ctx();
        let sub = ctx.bus.subscribe();
        let resp = handle_action(&req, &ctx);
        assert!(resp.result);
        assert!(matches!(sub.rx.recv_timeout(Duration::from_millis(50)), Ok(BusMessage::ArmAway { .. })));
    }

    fn test_ctx() -> HandlerContext {
        let bus = Bus::new();
        let dir = tempfile::tempdir().unwrap();
        let status_file = dir.path().join("status.json");
        let state_store = StateStore::new(status_file.to_str().unwrap().to_string(), bus.clone());
        let db_path = dir.path().join("ipc-test.sqlite3").to_str().unwrap().to_string();
        let output: Arc<Mutex<dyn crate::hardware::OutputDriver>> =
            Arc::new(Mutex::new(crate::hardware::output_driver::SimulatedOutputDriver::new(4)));
        let signs = Arc::new(OutputSignEngine::new(Arc::clone(&output), bus.clone()));
        let siren = Arc::new(SirenDriver::new(0, output, bus.clone()));
        HandlerContext {
            db_path,
            bus,
            state_store,
            signs,
            siren,
            gsm_port: None,
            gsm_baud: 115_200,
        }
    }
}
