//! Resumable content stream interpreter.
//!
//! [`ContentInterpreter`] tokenizes a content stream and executes one
//! operator per [`step`](ContentInterpreter::step). Operator handlers live
//! in [`super::ops`], one module per operator family, named after the PDF
//! operator they implement (`do_re`, `do_Tf`, ...).

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use smallvec::SmallVec;

use super::commands::{DrawCommand, DrawingSink, PathSegment, TextCommand};
use super::form_cache::{FormCache, FormKey};
use super::task::{CancellationToken, InterpreterState, StepBudget};
use crate::codec::filters::{FilterLimits, decode_filters, filter_chain};
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, PdfObject, PdfStream, dict_get};
use crate::model::state::GraphicsState;
use crate::parser::content_lexer::{ContentLexer, ContentToken};
use crate::utils::Point;

#[derive(Debug, Clone, Default)]
pub struct InterpreterOptions {
    /// Commands appended once after the content stream completes, such as
    /// pre-rendered annotation appearances.
    pub annotations: Vec<DrawCommand>,
    /// Treat the whole stream as if it were wrapped in `BX`/`EX`.
    pub tolerant_at_start: bool,
}

pub struct ContentInterpreter<'a, S: DrawingSink> {
    doc: Option<&'a Document>,
    data: Bytes,
    pos: usize,
    pub(crate) resources: Dictionary,
    sink: S,
    options: InterpreterOptions,
    /// Pages bracket their output in Push/Pop; forms are bracketed by the
    /// invoking interpreter instead.
    framed: bool,
    state: InterpreterState,
    cancel: CancellationToken,
    pub(crate) forms: Arc<FormCache>,
    pub(crate) active_forms: Vec<FormKey>,
    last_error: Option<String>,
    executed: usize,
    cleaned_up: bool,

    pub(crate) operands: SmallVec<[PdfObject; 8]>,
    pub(crate) gstate: GraphicsState,
    pub(crate) gstack: Vec<GraphicsState>,
    pub(crate) path: Vec<PathSegment>,
    pub(crate) current_point: Option<Point>,
    pub(crate) subpath_start: Option<Point>,
    /// Set by `W` (false) or `W*` (true) until the next painting operator.
    pub(crate) pending_clip: Option<bool>,
    pub(crate) pending_text: Option<TextCommand>,
    pub(crate) op_pos: usize,
    compat_depth: usize,
}

impl<'a, S: DrawingSink> ContentInterpreter<'a, S> {
    pub fn new(data: impl Into<Bytes>, resources: Dictionary, sink: S) -> Self {
        Self {
            doc: None,
            data: data.into(),
            pos: 0,
            resources,
            sink,
            options: InterpreterOptions::default(),
            framed: true,
            state: InterpreterState::NotStarted,
            cancel: CancellationToken::new(),
            forms: Arc::new(FormCache::new()),
            active_forms: Vec::new(),
            last_error: None,
            executed: 0,
            cleaned_up: false,
            operands: SmallVec::new(),
            gstate: GraphicsState::new(),
            gstack: Vec::new(),
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            pending_clip: None,
            pending_text: None,
            op_pos: 0,
            compat_depth: 0,
        }
    }

    /// Resolve indirect resources and decode streams through `doc`.
    pub fn with_document(mut self, doc: &'a Document) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Share memoized forms with other interpreters of the same document.
    pub fn with_form_cache(mut self, forms: Arc<FormCache>) -> Self {
        self.forms = forms;
        self
    }

    pub const fn state(&self) -> InterpreterState {
        self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn form_cache(&self) -> &Arc<FormCache> {
        &self.forms
    }

    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Message of the error that moved the interpreter to `Error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of operators executed so far.
    pub const fn executed(&self) -> usize {
        self.executed
    }

    /// Depth of the `q`/`Q` stack.
    pub fn stack_depth(&self) -> usize {
        self.gstack.len()
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub const fn graphics_state(&self) -> &GraphicsState {
        &self.gstate
    }

    pub(crate) const fn document(&self) -> Option<&'a Document> {
        self.doc
    }

    pub(crate) fn is_tolerant(&self) -> bool {
        self.options.tolerant_at_start || self.compat_depth > 0
    }

    /// Reset all interpreter state to the start of the stream.
    pub fn setup(&mut self) {
        self.pos = 0;
        self.operands.clear();
        self.gstack.clear();
        self.gstate = GraphicsState::new();
        self.path.clear();
        self.current_point = None;
        self.subpath_start = None;
        self.pending_clip = None;
        self.pending_text = None;
        self.compat_depth = 0;
        self.executed = 0;
        self.cleaned_up = false;
        self.last_error = None;
        if self.framed {
            self.sink.emit(DrawCommand::Push);
        }
        self.state = InterpreterState::Running;
    }

    /// Execute one operator.
    ///
    /// Returns `Running` while operators remain. On failure outside a
    /// `BX`/`EX` section the interpreter moves to `Error` and the error is
    /// returned; commands emitted so far stay in the sink.
    pub fn step(&mut self) -> Result<InterpreterState> {
        if self.state.is_finished() {
            return Ok(self.state);
        }
        if self.state == InterpreterState::NotStarted {
            self.setup();
        }
        if self.cancel.is_cancelled() {
            tracing::debug!(executed = self.executed, "content interpretation cancelled");
            self.state = InterpreterState::Stopped;
            return Ok(self.state);
        }
        self.state = InterpreterState::Running;

        match self.execute_next() {
            Ok(true) => {
                self.executed += 1;
                Ok(self.state)
            }
            Ok(false) => {
                self.cleanup();
                self.state = InterpreterState::Completed;
                Ok(self.state)
            }
            Err(err) => {
                self.state = InterpreterState::Error;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Step until the stream ends, an error occurs, the token is cancelled
    /// or `budget` is exhausted (`Paused`).
    pub fn run(&mut self, budget: StepBudget) -> Result<InterpreterState> {
        let started = Instant::now();
        let mut steps = 0usize;
        loop {
            let exhausted = match budget {
                StepBudget::Operators(max) => steps >= max,
                StepBudget::Duration(limit) => steps > 0 && started.elapsed() >= limit,
                StepBudget::Unbounded => false,
            };
            if exhausted && !self.state.is_finished() {
                self.state = InterpreterState::Paused;
                return Ok(self.state);
            }
            let state = self.step()?;
            if state.is_finished() {
                return Ok(state);
            }
            steps += 1;
        }
    }

    /// Flush pending output once the stream has been fully executed.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.flush_text();
        if !self.operands.is_empty() {
            tracing::debug!(count = self.operands.len(), "operands left at end of stream");
            self.operands.clear();
        }
        if self.framed {
            self.sink.emit(DrawCommand::Pop);
        }
        for cmd in std::mem::take(&mut self.options.annotations) {
            self.sink.emit(cmd);
        }
    }

    /// Send `cmd` to the sink after any pending text run.
    pub(crate) fn emit(&mut self, cmd: DrawCommand) {
        self.flush_text();
        self.sink.emit(cmd);
    }

    pub(crate) fn emit_all(&mut self, cmds: &[DrawCommand]) {
        self.flush_text();
        self.sink.emit_all(cmds);
    }

    pub(crate) fn flush_text(&mut self) {
        if let Some(run) = self.pending_text.take() {
            self.sink.emit(DrawCommand::Text(run));
        }
    }

    /// Read operands up to the next operator and execute it. Returns
    /// `false` at the end of the stream.
    fn execute_next(&mut self) -> Result<bool> {
        let data = self.data.clone();
        let mut lexer = ContentLexer::at(&data, self.pos);
        loop {
            let token = lexer.next_token();
            self.pos = lexer.tell();
            let Some(token) = token? else {
                return Ok(false);
            };
            let op = match token {
                ContentToken::Operator(op) => op,
                other => {
                    let value = read_operand(&mut lexer, other)?;
                    self.pos = lexer.tell();
                    self.operands.push(value);
                    continue;
                }
            };

            self.op_pos = self.pos - op.len();
            let result = if op == b"BI" {
                let result = self.read_inline_image(&mut lexer, &data);
                self.pos = lexer.tell();
                result
            } else {
                self.dispatch(op)
            };

            if let Err(err) = result {
                if !self.is_tolerant() {
                    self.operands.clear();
                    return Err(err);
                }
                tracing::warn!(
                    op = %String::from_utf8_lossy(op),
                    pos = self.op_pos,
                    error = %err,
                    "operator failed inside compatibility section"
                );
            }
            if !self.operands.is_empty() {
                tracing::debug!(
                    op = %String::from_utf8_lossy(op),
                    count = self.operands.len(),
                    "discarding residual operands"
                );
                self.operands.clear();
            }
            return Ok(true);
        }
    }

    fn dispatch(&mut self, op: &[u8]) -> Result<()> {
        tracing::trace!(op = %String::from_utf8_lossy(op), pos = self.op_pos, "dispatch");
        match op {
            // Graphics state
            b"q" => self.do_q(),
            b"Q" => self.do_Q(),
            b"cm" => {
                let [a, b, c, d, e, f] = self.pop_nums()?;
                self.do_cm((a, b, c, d, e, f));
            }
            b"w" => {
                let w = self.pop_num()?;
                self.do_w(w);
            }
            b"J" => {
                let cap = self.pop_int()?;
                self.do_J(cap);
            }
            b"j" => {
                let join = self.pop_int()?;
                self.do_j(join);
            }
            b"M" => {
                let limit = self.pop_num()?;
                self.do_M(limit);
            }
            b"d" => {
                let phase = self.pop_num()?;
                let array = self.pop_num_array()?;
                self.do_d(array, phase);
            }
            b"ri" => {
                self.pop_name()?;
            }
            b"i" => {
                self.pop_num()?;
            }
            b"gs" => {
                let name = self.pop_name()?;
                self.do_gs(name)?;
            }

            // Path construction
            b"m" => {
                let [x, y] = self.pop_nums()?;
                self.do_m(x, y);
            }
            b"l" => {
                let [x, y] = self.pop_nums()?;
                self.do_l(x, y);
            }
            b"c" => {
                let [x1, y1, x2, y2, x3, y3] = self.pop_nums()?;
                self.do_c((x1, y1), (x2, y2), (x3, y3));
            }
            b"v" => {
                let [x2, y2, x3, y3] = self.pop_nums()?;
                self.do_v((x2, y2), (x3, y3));
            }
            b"y" => {
                let [x1, y1, x3, y3] = self.pop_nums()?;
                self.do_y((x1, y1), (x3, y3));
            }
            b"h" => self.do_h(),
            b"re" => {
                let [x, y, w, h] = self.pop_nums()?;
                self.do_re(x, y, w, h);
            }

            // Path painting and clipping
            b"S" => self.do_S(),
            b"s" => self.do_s(),
            b"f" | b"F" => self.do_f(),
            b"f*" => self.do_f_star(),
            b"B" => self.do_B(),
            b"B*" => self.do_B_star(),
            b"b" => self.do_b(),
            b"b*" => self.do_b_star(),
            b"n" => self.do_n(),
            b"W" => self.do_W(),
            b"W*" => self.do_W_star(),
            b"sh" => {
                let name = self.pop_name()?;
                self.do_sh(name)?;
            }

            // Color
            b"CS" => {
                let space = self.pop()?;
                self.do_CS(&space)?;
            }
            b"cs" => {
                let space = self.pop()?;
                self.do_cs(&space)?;
            }
            b"SC" => self.do_SC()?,
            b"SCN" => self.do_SCN()?,
            b"sc" => self.do_sc()?,
            b"scn" => self.do_scn()?,
            b"G" => {
                let gray = self.pop_num()?;
                self.do_G(gray);
            }
            b"g" => {
                let gray = self.pop_num()?;
                self.do_g(gray);
            }
            b"RG" => {
                let [r, g, b] = self.pop_nums()?;
                self.do_RG(r, g, b);
            }
            b"rg" => {
                let [r, g, b] = self.pop_nums()?;
                self.do_rg(r, g, b);
            }
            b"K" => {
                let [c, m, y, k] = self.pop_nums()?;
                self.do_K(c, m, y, k);
            }
            b"k" => {
                let [c, m, y, k] = self.pop_nums()?;
                self.do_k(c, m, y, k);
            }

            // Text
            b"BT" => self.do_BT(),
            b"ET" => self.do_ET(),
            b"Tc" => {
                let spacing = self.pop_num()?;
                self.do_Tc(spacing);
            }
            b"Tw" => {
                let spacing = self.pop_num()?;
                self.do_Tw(spacing);
            }
            b"Tz" => {
                let scale = self.pop_num()?;
                self.do_Tz(scale);
            }
            b"TL" => {
                let leading = self.pop_num()?;
                self.do_TL(leading);
            }
            b"Tf" => {
                let size = self.pop_num()?;
                let font = self.pop_name()?;
                self.do_Tf(font, size)?;
            }
            b"Tr" => {
                let mode = self.pop_int()?;
                self.do_Tr(mode);
            }
            b"Ts" => {
                let rise = self.pop_num()?;
                self.do_Ts(rise);
            }
            b"Td" => {
                let [tx, ty] = self.pop_nums()?;
                self.do_Td(tx, ty);
            }
            b"TD" => {
                let [tx, ty] = self.pop_nums()?;
                self.do_TD(tx, ty);
            }
            b"Tm" => {
                let [a, b, c, d, e, f] = self.pop_nums()?;
                self.do_Tm((a, b, c, d, e, f));
            }
            b"T*" => self.do_T_star(),
            b"Tj" => {
                let s = self.pop_string()?;
                self.do_Tj(s);
            }
            b"'" => {
                let s = self.pop_string()?;
                self.do_quote(s);
            }
            b"\"" => {
                let s = self.pop_string()?;
                let [aw, ac] = self.pop_nums()?;
                self.do_double_quote(aw, ac, s);
            }
            b"TJ" => {
                let items = self.pop_array()?;
                self.do_TJ(items)?;
            }
            b"d0" => {
                self.pop_nums::<2>()?;
            }
            b"d1" => {
                self.pop_nums::<6>()?;
            }

            // XObjects and marked content
            b"Do" => {
                let name = self.pop_name()?;
                self.do_Do(name)?;
            }
            b"BMC" | b"MP" => {
                self.pop_name()?;
            }
            b"BDC" | b"DP" => {
                self.pop()?;
                self.pop_name()?;
            }
            b"EMC" => {}

            // Compatibility sections
            b"BX" => self.compat_depth += 1,
            b"EX" => self.compat_depth = self.compat_depth.saturating_sub(1),

            // Fused operators written by some legacy producers.
            b"QBT" => {
                self.do_Q();
                self.do_BT();
            }
            b"Qq" => {
                self.do_Q();
                self.do_q();
            }
            b"qBT" => {
                self.do_q();
                self.do_BT();
            }
            b"q0" | b"q1" => {
                tracing::debug!(op = %String::from_utf8_lossy(op), "ignoring legacy operator");
            }

            _ => {
                let name = String::from_utf8_lossy(op).into_owned();
                if self.is_tolerant() {
                    tracing::warn!(op = %name, pos = self.op_pos, "skipping unknown operator");
                    self.operands.clear();
                } else {
                    return Err(PdfError::UnknownOperator(name));
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Operand access
    // ------------------------------------------------------------------

    pub(crate) fn pop(&mut self) -> Result<PdfObject> {
        self.operands
            .pop()
            .ok_or_else(|| PdfError::format(self.op_pos, "operand stack underflow"))
    }

    pub(crate) fn pop_num(&mut self) -> Result<f64> {
        self.pop()?.as_num()
    }

    pub(crate) fn pop_int(&mut self) -> Result<i64> {
        self.pop()?.as_int()
    }

    pub(crate) fn pop_name(&mut self) -> Result<Name> {
        self.pop()?.as_name()
    }

    pub(crate) fn pop_string(&mut self) -> Result<Vec<u8>> {
        match self.pop()? {
            PdfObject::String(s) => Ok(s),
            other => Err(PdfError::TypeError {
                expected: "string",
                got: other.type_name(),
            }),
        }
    }

    pub(crate) fn pop_array(&mut self) -> Result<Vec<PdfObject>> {
        match self.pop()? {
            PdfObject::Array(items) => Ok(items),
            other => Err(PdfError::TypeError {
                expected: "array",
                got: other.type_name(),
            }),
        }
    }

    pub(crate) fn pop_num_array(&mut self) -> Result<Vec<f64>> {
        self.pop_array()?.iter().map(PdfObject::as_num).collect()
    }

    /// Pop `N` numbers, returned in stream order.
    pub(crate) fn pop_nums<const N: usize>(&mut self) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for slot in out.iter_mut().rev() {
            *slot = self.pop_num()?;
        }
        Ok(out)
    }

    /// Pop `n` numbers, returned in stream order.
    pub(crate) fn pop_num_vec(&mut self, n: usize) -> Result<SmallVec<[f64; 4]>> {
        if self.operands.len() < n {
            return Err(PdfError::format(self.op_pos, "operand stack underflow"));
        }
        let start = self.operands.len() - n;
        let nums = self.operands[start..]
            .iter()
            .map(PdfObject::as_num)
            .collect::<Result<SmallVec<_>>>()?;
        self.operands.truncate(start);
        Ok(nums)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub(crate) fn resolve(&self, obj: &PdfObject) -> Result<PdfObject> {
        match (obj, self.doc) {
            (PdfObject::Ref(_), Some(doc)) => doc.resolve(obj),
            (PdfObject::Ref(id), None) => {
                tracing::debug!(object = %id, "no document to resolve reference");
                Ok(PdfObject::Null)
            }
            _ => Ok(obj.clone()),
        }
    }

    /// Unresolved entry `name` of the resource category `category`.
    pub(crate) fn resource_entry(&self, category: &str, name: &Name) -> Result<PdfObject> {
        let Some(group) = dict_get(&self.resources, category) else {
            return Err(PdfError::runtime(format!("no /{category} resources for /{name}")));
        };
        let group = self.resolve(group)?;
        let group = group.as_dict()?;
        match group.get(name) {
            Some(entry) if !entry.is_null() => Ok(entry.clone()),
            _ => Err(PdfError::runtime(format!("resource /{name} missing from /{category}"))),
        }
    }

    pub(crate) fn resource(&self, category: &str, name: &Name) -> Result<PdfObject> {
        let entry = self.resource_entry(category, name)?;
        self.resolve(&entry)
    }

    /// Decoded payload of a stream referenced from this content stream.
    pub(crate) fn decode(&self, stream: &PdfStream) -> Result<Bytes> {
        match self.doc {
            Some(doc) => doc.decode_stream(stream),
            None => {
                let steps = filter_chain(stream.get("Filter"), stream.get("DecodeParms"))?;
                decode_filters(stream.raw().clone(), &steps, &FilterLimits::none())
            }
        }
    }

    /// Interpreter for a Form XObject body, sharing the document, form
    /// cache and cancellation token of `self`.
    pub(crate) fn nested<T: DrawingSink>(
        &self,
        data: Bytes,
        resources: Dictionary,
        sink: T,
        key: FormKey,
    ) -> ContentInterpreter<'a, T> {
        let mut child = ContentInterpreter::new(data, resources, sink)
            .with_cancellation(self.cancel.clone())
            .with_form_cache(Arc::clone(&self.forms));
        child.doc = self.doc;
        child.framed = false;
        child.active_forms = self.active_forms.clone();
        child.active_forms.push(key);
        child
    }
}

/// Build a complete operand value starting at `first`, reading nested
/// arrays and dictionaries from `lexer`.
pub(crate) fn read_operand(lexer: &mut ContentLexer<'_>, first: ContentToken<'_>) -> Result<PdfObject> {
    Ok(match first {
        ContentToken::Number(n) => n.into(),
        ContentToken::String(s) => PdfObject::String(s),
        ContentToken::Name(n) => PdfObject::Name(n),
        ContentToken::Bool(b) => PdfObject::Bool(b),
        ContentToken::Null => PdfObject::Null,
        ContentToken::ArrayStart | ContentToken::ProcStart => {
            let mut items = Vec::new();
            loop {
                let pos = lexer.tell();
                match lexer.next_token()? {
                    Some(ContentToken::ArrayEnd | ContentToken::ProcEnd) => break,
                    Some(ContentToken::Operator(op)) => {
                        return Err(PdfError::format(
                            pos,
                            format!("operator '{}' inside array", String::from_utf8_lossy(op)),
                        ));
                    }
                    Some(token) => items.push(read_operand(lexer, token)?),
                    None => return Err(PdfError::format(pos, "expected ']'")),
                }
            }
            PdfObject::Array(items)
        }
        ContentToken::DictStart => {
            let mut dict = Dictionary::default();
            loop {
                let pos = lexer.tell();
                let key = match lexer.next_token()? {
                    Some(ContentToken::DictEnd) => break,
                    Some(ContentToken::Name(key)) => key,
                    Some(_) => return Err(PdfError::format(pos, "dictionary key is not a name")),
                    None => return Err(PdfError::format(pos, "expected '>>'")),
                };
                let pos = lexer.tell();
                let value = match lexer.next_token()? {
                    Some(ContentToken::Operator(_) | ContentToken::DictEnd) | None => {
                        return Err(PdfError::format(pos, "dictionary key without value"));
                    }
                    Some(token) => read_operand(lexer, token)?,
                };
                dict.insert(key, value);
            }
            PdfObject::Dict(dict)
        }
        ContentToken::ArrayEnd | ContentToken::ProcEnd | ContentToken::DictEnd => {
            return Err(PdfError::format(lexer.tell(), "unbalanced closing delimiter"));
        }
        ContentToken::Operator(op) => {
            return Err(PdfError::format(
                lexer.tell(),
                format!("unexpected operator '{}'", String::from_utf8_lossy(op)),
            ));
        }
    })
}
