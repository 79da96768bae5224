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

//! Port allocation for broker instances started by concurrent test sessions.
//!
//! Availability is checked with a real bind-and-release against the OS rather
//! than any cached free-list, so two sessions racing for the same port are
//! arbitrated by the kernel. The released port can still be grabbed by another
//! process before the broker binds it; the readiness poll after spawn covers
//! that window.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::ParseIntError;
use std::str::FromStr;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::HarnessError;

/// How many ephemeral picks to retry when the OS hands back an excluded port.
const EPHEMERAL_ATTEMPTS: usize = 16;

/// Constraint describing how to pick a TCP port for one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// Use this port as-is, without probing for availability.
    Exact(u16),
    /// Any ephemeral port the OS considers free.
    Any,
    /// First free port within the inclusive range.
    Range(u16, u16),
    /// First free port among the candidates, tried in the given order.
    Set(Vec<u16>),
    /// Sub-specs tried in order; the first that resolves wins.
    Try(Vec<PortSpec>),
}

impl Default for PortSpec {
    fn default() -> Self {
        PortSpec::Any
    }
}

impl FromStr for PortSpec {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u16>().map(PortSpec::Exact)
    }
}

/// Free-port oracle. Tests inject a stub so allocation is deterministic;
/// production code uses [`BindProbe`].
pub trait PortProbe {
    /// Whether `port` can currently be bound on `host`.
    fn is_free(&self, host: &str, port: u16) -> bool;

    /// An ephemeral port the OS considers free, if one can be obtained.
    fn ephemeral(&self, host: &str) -> Option<u16>;
}

/// Probe that binds a TCP socket and immediately releases it.
#[derive(Debug, Default)]
pub struct BindProbe;

impl PortProbe for BindProbe {
    fn is_free(&self, host: &str, port: u16) -> bool {
        bind_tcp(host, port).is_ok()
    }

    fn ephemeral(&self, host: &str) -> Option<u16> {
        bind_tcp(host, 0).ok()
    }
}

fn bind_tcp(host: &str, port: u16) -> io::Result<u16> {
    let ip: IpAddr = host
        .parse()
        .unwrap_or_else(|_| IpAddr::V4(Ipv4Addr::LOCALHOST));
    let addr = SocketAddr::new(ip, port);

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.bind(&addr.into())?;

    let local = socket
        .local_addr()?
        .as_socket()
        .ok_or_else(|| io::Error::other("bound address is not an IP socket"))?;
    Ok(local.port())
}

/// Resolve `spec` to a single concrete port on `host`, never returning a port
/// listed in `exclude`.
pub fn allocate(
    host: &str,
    spec: &PortSpec,
    exclude: &[u16],
    probe: &dyn PortProbe,
) -> Result<u16, HarnessError> {
    resolve_spec(host, spec, exclude, probe).ok_or_else(|| HarnessError::PortUnavailable {
        spec: spec.clone(),
    })
}

fn resolve_spec(host: &str, spec: &PortSpec, exclude: &[u16], probe: &dyn PortProbe) -> Option<u16> {
    match spec {
        PortSpec::Exact(port) => (!exclude.contains(port)).then_some(*port),
        PortSpec::Any => {
            for _ in 0..EPHEMERAL_ATTEMPTS {
                let port = probe.ephemeral(host)?;
                if !exclude.contains(&port) {
                    return Some(port);
                }
            }
            None
        }
        PortSpec::Range(lo, hi) => {
            (*lo..=*hi).find(|port| !exclude.contains(port) && probe.is_free(host, *port))
        }
        PortSpec::Set(candidates) => candidates
            .iter()
            .copied()
            .find(|port| !exclude.contains(port) && probe.is_free(host, *port)),
        PortSpec::Try(specs) => specs
            .iter()
            .find_map(|sub| resolve_spec(host, sub, exclude, probe)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::TcpListener;

    const HOST: &str = "127.0.0.1";

    /// Oracle with a fixed notion of which ports are free.
    struct StubProbe {
        free: Vec<u16>,
        ephemeral: Vec<u16>,
        next_ephemeral: Cell<usize>,
    }

    impl StubProbe {
        fn new(free: &[u16], ephemeral: &[u16]) -> Self {
            Self {
                free: free.to_vec(),
                ephemeral: ephemeral.to_vec(),
                next_ephemeral: Cell::new(0),
            }
        }
    }

    impl PortProbe for StubProbe {
        fn is_free(&self, _host: &str, port: u16) -> bool {
            self.free.contains(&port)
        }

        fn ephemeral(&self, _host: &str) -> Option<u16> {
            let index = self.next_ephemeral.get();
            self.next_ephemeral.set(index + 1);
            self.ephemeral.get(index % self.ephemeral.len()).copied()
        }
    }

    #[test]
    fn exact_port_returned_as_is() {
        let probe = StubProbe::new(&[], &[]);
        let port = allocate(HOST, &PortSpec::Exact(5672), &[], &probe).unwrap();
        assert_eq!(port, 5672);
    }

    #[test]
    fn exact_port_in_exclusion_set_fails() {
        let probe = StubProbe::new(&[5672], &[]);
        let result = allocate(HOST, &PortSpec::Exact(5672), &[5672], &probe);
        assert!(matches!(
            result,
            Err(HarnessError::PortUnavailable {
                spec: PortSpec::Exact(5672)
            })
        ));
    }

    #[test]
    fn range_picks_first_free_port_within_bounds() {
        let probe = StubProbe::new(&[2002, 2003], &[]);
        let port = allocate(HOST, &PortSpec::Range(2000, 3000), &[], &probe).unwrap();
        assert_eq!(port, 2002);
        assert!((2000..=3000).contains(&port));
    }

    #[test]
    fn range_never_returns_excluded_port() {
        let probe = StubProbe::new(&[2002, 2003], &[]);
        let port = allocate(HOST, &PortSpec::Range(2000, 3000), &[2002], &probe).unwrap();
        assert_eq!(port, 2003);
    }

    #[test]
    fn range_with_no_free_port_fails() {
        let probe = StubProbe::new(&[], &[]);
        let result = allocate(HOST, &PortSpec::Range(2000, 2010), &[], &probe);
        assert!(matches!(result, Err(HarnessError::PortUnavailable { .. })));
    }

    #[test]
    fn set_is_tried_exhaustively_in_order() {
        let probe = StubProbe::new(&[4003], &[]);
        let port = allocate(HOST, &PortSpec::Set(vec![4002, 4003]), &[], &probe).unwrap();
        assert_eq!(port, 4003);
    }

    #[test]
    fn empty_set_fails() {
        let probe = StubProbe::new(&[], &[]);
        let result = allocate(HOST, &PortSpec::Set(Vec::new()), &[], &probe);
        assert!(matches!(result, Err(HarnessError::PortUnavailable { .. })));
    }

    #[test]
    fn try_list_returns_first_resolvable_sub_spec() {
        let probe = StubProbe::new(&[4002], &[]);
        let spec = PortSpec::Try(vec![
            PortSpec::Range(2000, 2010),
            PortSpec::Set(vec![4002, 4003]),
        ]);
        let port = allocate(HOST, &spec, &[], &probe).unwrap();
        assert_eq!(port, 4002);
    }

    #[test]
    fn any_skips_excluded_ephemeral_picks() {
        let probe = StubProbe::new(&[], &[5000, 5001]);
        let port = allocate(HOST, &PortSpec::Any, &[5000], &probe).unwrap();
        assert_eq!(port, 5001);
    }

    #[test]
    fn primary_then_secondary_are_distinct() {
        let probe = StubProbe::new(&[5672, 5673], &[]);
        let primary = allocate(HOST, &PortSpec::Set(vec![5672, 5673]), &[], &probe).unwrap();
        let secondary =
            allocate(HOST, &PortSpec::Set(vec![5672, 5673]), &[primary], &probe).unwrap();
        assert_ne!(primary, secondary);
    }

    #[test]
    fn spec_parses_from_port_string() {
        assert_eq!("5672".parse::<PortSpec>().unwrap(), PortSpec::Exact(5672));
        assert!("not-a-port".parse::<PortSpec>().is_err());
    }

    #[test]
    fn bind_probe_sees_bound_port_as_busy() {
        let listener = TcpListener::bind((HOST, 0)).unwrap();
        let busy = listener.local_addr().unwrap().port();
        assert!(!BindProbe.is_free(HOST, busy));
    }

    #[test]
    fn bind_probe_hands_out_ephemeral_ports() {
        let port = BindProbe.ephemeral(HOST).unwrap();
        assert_ne!(port, 0);
    }
}
