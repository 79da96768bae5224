/*
 * Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use std::fs;
use std::path::PathBuf;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

const STOP_GRACE_S: u64 = 5;
const REAP_POLL_INTERVAL_MS: u64 = 50;

/// Read captured stdout and stderr back from their log files.
pub fn collect_logs(stdout_path: &Option<PathBuf>, stderr_path: &Option<PathBuf>) -> (String, String) {
    let read = |path: &Option<PathBuf>| {
        path.as_ref()
            .and_then(|p| fs::read_to_string(p).ok())
            .unwrap_or_else(|| "[no captured output]".to_string())
    };
    (read(stdout_path), read(stderr_path))
}

/// Dump captured logs to stderr when a test is panicking (for Drop impls).
pub fn dump_logs_on_panic(
    binary_name: &str,
    stdout_path: &Option<PathBuf>,
    stderr_path: &Option<PathBuf>,
) {
    if thread::panicking() {
        let (stdout, stderr) = collect_logs(stdout_path, stderr_path);
        eprintln!("{} stdout:\n{}", binary_name, stdout);
        eprintln!("{} stderr:\n{}", binary_name, stderr);
    }
}

/// Check whether a process is alive (and not a zombie) by PID.
#[cfg(target_os = "linux")]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The state field follows the parenthesized command name; Z and X mark
    // zombie and dead processes.
    let Some(name_end) = stat.rfind(')') else {
        return false;
    };
    let state = stat[name_end + 1..].trim_start().chars().next();
    !matches!(state, None | Some('Z') | Some('X'))
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Gracefully stop a child: SIGTERM, a bounded wait for it to exit, then
/// SIGKILL. A child that has already exited is reaped by the first `try_wait`.
/// The child is returned for final cleanup via `wait_with_output`.
pub fn graceful_kill(mut child: Child) -> Child {
    let pid = child.id() as libc::pid_t;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let deadline = Instant::now() + Duration::from_secs(STOP_GRACE_S);
    loop {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => return child,
            Ok(None) if Instant::now() >= deadline => break,
            Ok(None) => thread::sleep(Duration::from_millis(REAP_POLL_INTERVAL_MS)),
        }
    }

    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }

    child
}
