//! `ServerState`, [`ServerBuilder`] and the client handle requests are
//! submitted through.
//!
//! No file-based configuration is specified (spec §3 is silent on it), so
//! construction takes its external collaborators as constructor arguments,
//! the way `breakpad_handler::BreakpadHandler::attach` takes its crash
//! directory and callback rather than reading a config file.

use crate::dispatcher::Dispatcher;
use crate::error::{invalid_request, Error};
use crate::file_table::FileTable;
use crate::request::{Call, Request, Response};
use rdbg_trace::{Arch, DwarfInfo, SymbolResolver, ValuePrinter, X86_64};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the dispatcher mutates: the tracer (C5–C9, C11), the file
/// table, and the collaborators the evaluator/stack-walker consult.
/// Spec §3's `ServerState` record.
pub(crate) struct ServerState {
    pub(crate) tracer: rdbg_trace::Tracer,
    pub(crate) files: FileTable,
    pub(crate) symbols: Arc<dyn SymbolResolver>,
    pub(crate) dwarf: Arc<dyn DwarfInfo>,
    pub(crate) printer: Arc<dyn ValuePrinter>,
}

#[derive(Default)]
pub struct ServerBuilder {
    executable: Option<PathBuf>,
    arch: Option<Box<dyn Arch>>,
    dwarf: Option<Arc<dyn DwarfInfo>>,
    symbols: Option<Arc<dyn SymbolResolver>>,
    printer: Option<Arc<dyn ValuePrinter>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Defaults to [`rdbg_trace::X86_64`] if never called.
    pub fn arch(mut self, arch: impl Arch + 'static) -> Self {
        self.arch = Some(Box::new(arch));
        self
    }

    pub fn dwarf(mut self, dwarf: Arc<dyn DwarfInfo>) -> Self {
        self.dwarf = Some(dwarf);
        self
    }

    pub fn symbols(mut self, symbols: Arc<dyn SymbolResolver>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn printer(mut self, printer: Arc<dyn ValuePrinter>) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Builds the dispatcher and a [`Client`] handle to it. The caller is
    /// responsible for running `dispatcher.run()` on a dedicated thread;
    /// this crate does not spawn one for you, since the single-threaded
    /// invariant (spec §5) is the caller's to uphold.
    pub fn build(self) -> Result<(Client, Dispatcher), Error> {
        let executable = self
            .executable
            .ok_or_else(|| invalid_request("ServerBuilder is missing an executable path"))?;
        let dwarf = self
            .dwarf
            .ok_or_else(|| invalid_request("ServerBuilder is missing a DwarfInfo collaborator"))?;
        let symbols = self
            .symbols
            .ok_or_else(|| invalid_request("ServerBuilder is missing a SymbolResolver collaborator"))?;
        let printer = self
            .printer
            .ok_or_else(|| invalid_request("ServerBuilder is missing a ValuePrinter collaborator"))?;
        let arch = self.arch.unwrap_or_else(|| Box::new(X86_64));

        let tracer = rdbg_trace::Tracer::new(arch, executable);
        let state = ServerState {
            tracer,
            files: FileTable::new(),
            symbols,
            dwarf,
            printer,
        };

        let (breakpoint_tx, breakpoint_rx) = crossbeam::channel::unbounded();
        let (other_tx, other_rx) = crossbeam::channel::unbounded();

        let dispatcher = Dispatcher::new(state, breakpoint_rx, other_rx);
        let client = Client { breakpoint_tx, other_tx };
        Ok((client, dispatcher))
    }
}

/// Cheap to clone; every clone submits to the same dispatcher. Requests
/// from arbitrary threads serialize on the dispatcher's two lanes (spec
/// §5).
#[derive(Clone)]
pub struct Client {
    breakpoint_tx: crossbeam::channel::Sender<Call>,
    other_tx: crossbeam::channel::Sender<Call>,
}

impl Client {
    pub fn submit(&self, request: Request) -> Result<Response, Error> {
        let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
        let lane_tx = match request.lane() {
            crate::request::Lane::Breakpoint => &self.breakpoint_tx,
            crate::request::Lane::Other => &self.other_tx,
        };

        lane_tx
            .send(Call { request, reply: reply_tx })
            .map_err(|_| invalid_request("dispatcher has shut down"))?;

        reply_rx.recv().map_err(|_| invalid_request("dispatcher has shut down"))?
    }
}
