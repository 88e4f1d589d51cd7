//! Dispatcher (component C8).
//!
//! A single consumer loop selects nondeterministically between the
//! breakpoint lane and the other lane (spec §4.7); whichever request
//! arrives is handled synchronously before the loop selects again. Inside
//! `Resume`, the breakpoint lane is drained directly (not through
//! `Select`) by `rdbg_trace::Tracer::resume`'s polling closure, which is
//! how a pending `Breakpoint` request preempts a long `cont()` (spec §9).

use crate::error::{invalid_request, Error};
use crate::evaluator;
use crate::request::{Call, FrameRecord, Request, Response};
use crate::server::ServerState;
use crossbeam::channel::{Receiver, Select};
use rdbg_trace::{Address, PendingBreakpointRequest};

pub struct Dispatcher {
    state: ServerState,
    breakpoint_rx: Receiver<Call>,
    other_rx: Receiver<Call>,
}

/// One breakpoint-lane [`Call`], resolved to concrete PCs, queued while a
/// `Resume` is blocked in its run-to-next-stop loop.
struct PendingBreakpoint {
    addresses: Vec<Address>,
    reply: crossbeam::channel::Sender<Result<Response, Error>>,
}

impl PendingBreakpointRequest for PendingBreakpoint {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn ack(self, result: Result<(), rdbg_trace::Error>) {
        let response = result.map(|_| Response::Breakpoint).map_err(Error::from);
        let _ = self.reply.send(response);
    }
}

impl Dispatcher {
    pub(crate) fn new(state: ServerState, breakpoint_rx: Receiver<Call>, other_rx: Receiver<Call>) -> Self {
        Self { state, breakpoint_rx, other_rx }
    }

    /// Drains both lanes forever. Intended to run on the single dedicated
    /// dispatcher thread (spec §5); stops once every [`crate::server::Client`]
    /// has been dropped and both lanes report closed/empty.
    pub fn run(mut self) {
        log::debug!("dispatcher started");
        loop {
            let mut select = Select::new();
            let bp_idx = select.recv(&self.breakpoint_rx);
            let other_idx = select.recv(&self.other_rx);
            let oper = select.select();

            let call = match oper.index() {
                i if i == bp_idx => oper.recv(&self.breakpoint_rx),
                i if i == other_idx => oper.recv(&self.other_rx),
                _ => unreachable!("Select only registered two operations"),
            };

            match call {
                Ok(call) => self.handle(call),
                Err(_) => {
                    if self.breakpoint_rx.is_empty() && self.other_rx.is_empty() {
                        log::debug!("dispatcher stopping, both lanes closed");
                        return;
                    }
                }
            }
        }
    }

    fn handle(&mut self, call: Call) {
        let result = self.dispatch(call.request);
        if let Err(ref e) = result {
            log::warn!("request failed: {e}");
        }
        let _ = call.reply.send(result);
    }

    fn dispatch(&mut self, request: Request) -> Result<Response, Error> {
        match request {
            Request::Open { name, mode } => {
                let fd = self.state.files.open(&name, mode)?;
                Ok(Response::Open { fd })
            }
            Request::ReadAt { fd, offset, len } => {
                let data = self.state.files.read_at(fd, offset, len)?;
                Ok(Response::ReadAt { data })
            }
            Request::Close { fd } => {
                self.state.files.close(fd)?;
                Ok(Response::Close)
            }
            Request::Run => {
                self.state.tracer.run()?;
                Ok(Response::Run)
            }
            Request::Resume => self.dispatch_resume(),
            Request::Breakpoint { address } => {
                let addresses = evaluator::resolve_breakpoint_addresses(&address, self.state.symbols.as_ref())?;
                for addr in addresses {
                    self.state.tracer.install_breakpoint(addr)?;
                }
                Ok(Response::Breakpoint)
            }
            Request::RemoveBreakpoint { address } => {
                self.state.tracer.remove_breakpoint(address)?;
                Ok(Response::RemoveBreakpoint)
            }
            Request::Eval { expr } => {
                let result = evaluator::eval(
                    &expr,
                    self.state.symbols.as_ref(),
                    self.state.dwarf.as_ref(),
                    self.state.printer.as_ref(),
                )?;
                Ok(Response::Eval { result })
            }
            Request::Frames { count } => {
                let frames = self.state.tracer.frames(
                    self.state.dwarf.as_ref(),
                    self.state.symbols.as_ref(),
                    self.state.printer.as_ref(),
                    count,
                )?;
                Ok(Response::Frames {
                    frames: frames.into_iter().map(|f| FrameRecord { s: f.text }).collect(),
                })
            }
        }
    }

    fn dispatch_resume(&mut self) -> Result<Response, Error> {
        let symbols = self.state.symbols.clone();
        let breakpoint_rx = self.breakpoint_rx.clone();

        let poll = move || -> Option<PendingBreakpoint> {
            loop {
                let call = breakpoint_rx.try_recv().ok()?;
                let Request::Breakpoint { address } = call.request else {
                    let _ = call.reply.send(Err(invalid_request("non-breakpoint request on the breakpoint lane")));
                    continue;
                };
                match evaluator::resolve_breakpoint_addresses(&address, symbols.as_ref()) {
                    Ok(addresses) => return Some(PendingBreakpoint { addresses, reply: call.reply }),
                    Err(e) => {
                        let _ = call.reply.send(Err(e));
                        continue;
                    }
                }
            }
        };

        let status = self.state.tracer.resume(poll)?;
        Ok(Response::Resume { status: status.into() })
    }
}
