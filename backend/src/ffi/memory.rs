//! In-memory sourcekitd runtime
//!
//! Emulates the request-object model of sourcekitd:
//! - objects are reference counted, creation hands out one reference
//! - arrays and dictionaries retain their children and release them when
//!   they are freed themselves
//! - UIDs are interned once and live for the life of the runtime
//! - description buffers belong to the caller until freed
//!
//! The runtime also keeps an audit trail (release calls per object, double
//! releases, outstanding buffers) so tests can check the release discipline
//! of the handles built on top of it. Misuse is counted, never panics.

use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_void, CString};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ObjectApi, RawObject, RawUid};

/// First token handed out; tokens double as fake addresses and are never reused
const FIRST_TOKEN: usize = 0x1000;
const TOKEN_STRIDE: usize = 0x10;

/// Snapshot of the runtime's audit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Objects successfully created so far
    pub objects_created: usize,
    /// Objects still holding at least one reference
    pub live_objects: usize,
    /// `release` calls made from outside the runtime
    pub release_calls: usize,
    /// `release` calls on an object that was already freed
    pub double_releases: usize,
    /// Calls that referenced an unknown or freed object/UID
    pub invalid_accesses: usize,
    /// Description buffers handed out
    pub descriptions_copied: usize,
    /// Description buffers handed out and not freed yet
    pub outstanding_descriptions: usize,
    /// Distinct UIDs interned
    pub interned_uids: usize,
    /// `uid_get_from_buf` calls
    pub intern_calls: usize,
    /// Creation calls refused by failure injection
    pub refused_allocations: usize,
}

#[derive(Debug)]
enum Node {
    Int64(i64),
    String(String),
    Uid(usize),
    Array(Vec<Option<usize>>),
    Dictionary(Vec<(usize, Option<usize>)>),
}

impl Node {
    fn children(&self) -> Vec<usize> {
        match self {
            Node::Array(items) => items.iter().flatten().copied().collect(),
            Node::Dictionary(entries) => entries.iter().filter_map(|(_, v)| *v).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    node: Node,
    refcount: usize,
}

#[derive(Debug, Default)]
struct State {
    next_token: usize,
    objects: HashMap<usize, Entry>,
    freed: HashSet<usize>,
    release_calls: HashMap<usize, usize>,
    uid_names: HashMap<usize, String>,
    uid_tokens: HashMap<String, usize>,
    descriptions: HashSet<usize>,
    refused_strings: HashSet<String>,
    allocation_budget: Option<usize>,
    stats: RuntimeStats,
}

impl State {
    fn next_token(&mut self) -> usize {
        let token = self.next_token.max(FIRST_TOKEN);
        self.next_token = token + TOKEN_STRIDE;
        token
    }

    /// Consume one unit of the allocation budget, if a budget is set.
    fn take_allocation(&mut self) -> bool {
        match self.allocation_budget {
            Some(0) => {
                self.stats.refused_allocations += 1;
                false
            }
            Some(remaining) => {
                self.allocation_budget = Some(remaining - 1);
                true
            }
            None => true,
        }
    }

    fn insert(&mut self, node: Node) -> Option<RawObject> {
        let token = self.next_token();
        self.objects.insert(token, Entry { node, refcount: 1 });
        self.stats.objects_created += 1;
        RawObject::from_ptr(token as *mut c_void)
    }

    fn is_live(&self, token: usize) -> bool {
        self.objects.contains_key(&token)
    }

    fn retain(&mut self, token: usize) {
        match self.objects.get_mut(&token) {
            Some(entry) => entry.refcount += 1,
            None => self.stats.invalid_accesses += 1,
        }
    }

    /// Drop one reference, freeing and cascading into children at zero.
    fn release_reference(&mut self, token: usize) {
        let mut pending = vec![token];
        while let Some(token) = pending.pop() {
            let Some(entry) = self.objects.get_mut(&token) else {
                self.stats.invalid_accesses += 1;
                continue;
            };
            entry.refcount -= 1;
            if entry.refcount == 0 {
                if let Some(entry) = self.objects.remove(&token) {
                    pending.extend(entry.node.children());
                }
                self.freed.insert(token);
            }
        }
    }

    fn uid_name(&self, token: usize) -> &str {
        self.uid_names.get(&token).map(String::as_str).unwrap_or("<unknown uid>")
    }

    fn render_slot(&self, slot: Option<usize>, indent: usize, out: &mut String) {
        match slot {
            Some(token) => self.render(token, indent, out),
            None => out.push_str("<null>"),
        }
    }

    fn render(&self, token: usize, indent: usize, out: &mut String) {
        let Some(entry) = self.objects.get(&token) else {
            out.push_str("<released>");
            return;
        };
        match &entry.node {
            Node::Int64(value) => out.push_str(&value.to_string()),
            Node::String(value) => push_quoted(out, value),
            Node::Uid(uid) => out.push_str(self.uid_name(*uid)),
            Node::Array(items) => {
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    push_indent(out, indent + 1);
                    self.render_slot(*item, indent + 1, out);
                    if i + 1 < items.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                push_indent(out, indent);
                out.push(']');
            }
            Node::Dictionary(entries) => {
                if entries.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{\n");
                for (i, (key, value)) in entries.iter().enumerate() {
                    push_indent(out, indent + 1);
                    out.push_str(self.uid_name(*key));
                    out.push_str(": ");
                    self.render_slot(*value, indent + 1, out);
                    if i + 1 < entries.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                push_indent(out, indent);
                out.push('}');
            }
        }
    }
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn token_of(object: RawObject) -> usize {
    object.as_ptr() as usize
}

fn uid_token(uid: RawUid) -> usize {
    uid.as_ptr() as usize
}

/// Pure-Rust implementation of [`ObjectApi`]
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use sourcekitd_object::{MemoryRuntime, SourceKit};
///
/// let runtime = Arc::new(MemoryRuntime::new());
/// let sk = SourceKit::new(runtime.clone());
///
/// let object = sk.object(&vec!["a", "b"]).unwrap();
/// assert!(object.description().contains("\"a\""));
///
/// drop(object);
/// assert_eq!(runtime.stats().live_objects, 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<State>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> RuntimeStats {
        let state = self.state();
        RuntimeStats {
            live_objects: state.objects.len(),
            outstanding_descriptions: state.descriptions.len(),
            interned_uids: state.uid_names.len(),
            ..state.stats
        }
    }

    /// Number of external `release` calls made on `object`
    pub fn release_count(&self, object: RawObject) -> usize {
        self.state()
            .release_calls
            .get(&token_of(object))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_live(&self, object: RawObject) -> bool {
        self.state().is_live(token_of(object))
    }

    /// Current reference count of `object`, 0 once freed
    pub fn refcount(&self, object: RawObject) -> usize {
        self.state()
            .objects
            .get(&token_of(object))
            .map_or(0, |entry| entry.refcount)
    }

    /// Refuse every future `string_create` of exactly `value`.
    pub fn refuse_string(&self, value: impl Into<String>) {
        self.state().refused_strings.insert(value.into());
    }

    /// Allow `budget` more object creations, then refuse them all.
    /// `None` lifts the limit.
    pub fn set_allocation_budget(&self, budget: Option<usize>) {
        self.state().allocation_budget = budget;
    }
}

impl ObjectApi for MemoryRuntime {
    fn int64_create(&self, value: i64) -> Option<RawObject> {
        let mut state = self.state();
        if !state.take_allocation() {
            return None;
        }
        state.insert(Node::Int64(value))
    }

    fn string_create(&self, value: &str) -> Option<RawObject> {
        let mut state = self.state();
        if state.refused_strings.contains(value) {
            state.stats.refused_allocations += 1;
            return None;
        }
        if !state.take_allocation() {
            return None;
        }
        state.insert(Node::String(value.to_owned()))
    }

    fn uid_create(&self, uid: RawUid) -> Option<RawObject> {
        let mut state = self.state();
        let token = uid_token(uid);
        if !state.uid_names.contains_key(&token) {
            state.stats.invalid_accesses += 1;
            return None;
        }
        if !state.take_allocation() {
            return None;
        }
        state.insert(Node::Uid(token))
    }

    unsafe fn array_create(&self, elements: &[Option<RawObject>]) -> Option<RawObject> {
        let mut state = self.state();
        let items: Vec<Option<usize>> = elements.iter().map(|e| e.map(token_of)).collect();
        if items.iter().flatten().any(|token| !state.is_live(*token)) {
            state.stats.invalid_accesses += 1;
            return None;
        }
        if !state.take_allocation() {
            return None;
        }
        for token in items.iter().flatten() {
            state.retain(*token);
        }
        state.insert(Node::Array(items))
    }

    unsafe fn dictionary_create(
        &self,
        keys: &[Option<RawUid>],
        values: &[Option<RawObject>],
    ) -> Option<RawObject> {
        let mut state = self.state();
        if keys.len() != values.len() {
            state.stats.invalid_accesses += 1;
            return None;
        }
        let mut entries = Vec::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            let key = key.map(uid_token).filter(|k| state.uid_names.contains_key(k));
            let value = value.map(token_of);
            match key {
                Some(key) if value.map_or(true, |v| state.is_live(v)) => entries.push((key, value)),
                _ => {
                    state.stats.invalid_accesses += 1;
                    return None;
                }
            }
        }
        if !state.take_allocation() {
            return None;
        }
        for (_, value) in &entries {
            if let Some(token) = value {
                state.retain(*token);
            }
        }
        state.insert(Node::Dictionary(entries))
    }

    unsafe fn dictionary_set_value(&self, dict: RawObject, key: RawUid, value: RawObject) {
        let mut state = self.state();
        let (dict, key, value) = (token_of(dict), uid_token(key), token_of(value));
        if dict == value || !state.is_live(value) || !state.uid_names.contains_key(&key) {
            state.stats.invalid_accesses += 1;
            return;
        }
        let replaced = match state.objects.get_mut(&dict).map(|e| &mut e.node) {
            Some(Node::Dictionary(entries)) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, slot)) => Ok(slot.replace(value)),
                    None => {
                        entries.push((key, Some(value)));
                        Ok(None)
                    }
                }
            }
            _ => Err(()),
        };
        match replaced {
            Ok(previous) => {
                state.retain(value);
                if let Some(previous) = previous {
                    state.release_reference(previous);
                }
            }
            Err(()) => state.stats.invalid_accesses += 1,
        }
    }

    unsafe fn release(&self, object: RawObject) {
        let mut state = self.state();
        let token = token_of(object);
        *state.release_calls.entry(token).or_insert(0) += 1;
        state.stats.release_calls += 1;
        if state.is_live(token) {
            state.release_reference(token);
        } else if state.freed.contains(&token) {
            state.stats.double_releases += 1;
        } else {
            state.stats.invalid_accesses += 1;
        }
    }

    unsafe fn description_copy(&self, object: RawObject) -> Option<NonNull<c_char>> {
        let mut state = self.state();
        let token = token_of(object);
        if !state.is_live(token) {
            state.stats.invalid_accesses += 1;
            return None;
        }
        let mut text = String::new();
        state.render(token, 0, &mut text);
        let buffer = CString::new(text).ok()?.into_raw();
        state.descriptions.insert(buffer as usize);
        state.stats.descriptions_copied += 1;
        NonNull::new(buffer)
    }

    unsafe fn description_free(&self, buffer: NonNull<c_char>) {
        let mut state = self.state();
        if state.descriptions.remove(&(buffer.as_ptr() as usize)) {
            // SAFETY: the address was produced by `CString::into_raw` in
            // `description_copy` and was still outstanding.
            drop(unsafe { CString::from_raw(buffer.as_ptr()) });
        } else {
            state.stats.invalid_accesses += 1;
        }
    }

    fn uid_get_from_buf(&self, name: &str) -> Option<RawUid> {
        let mut state = self.state();
        state.stats.intern_calls += 1;
        let token = match state.uid_tokens.get(name) {
            Some(token) => *token,
            None => {
                let token = state.next_token();
                state.uid_tokens.insert(name.to_owned(), token);
                state.uid_names.insert(token, name.to_owned());
                token
            }
        };
        RawUid::from_ptr(token as *mut c_void)
    }

    fn uid_get_string(&self, uid: RawUid) -> Option<String> {
        self.state().uid_names.get(&uid_token(uid)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(runtime: &MemoryRuntime, name: &str) -> RawUid {
        runtime.uid_get_from_buf(name).unwrap()
    }

    #[test]
    fn test_container_retains_children() {
        let runtime = MemoryRuntime::new();
        let a = runtime.string_create("a").unwrap();
        let array = unsafe { runtime.array_create(&[Some(a), None]) }.unwrap();

        assert_eq!(runtime.refcount(a), 2);
        unsafe { runtime.release(a) };
        assert!(runtime.is_live(a));

        unsafe { runtime.release(array) };
        assert!(!runtime.is_live(a));
        assert_eq!(runtime.stats().live_objects, 0);
        assert_eq!(runtime.stats().double_releases, 0);
    }

    #[test]
    fn test_double_release_is_counted() {
        let runtime = MemoryRuntime::new();
        let value = runtime.int64_create(1).unwrap();
        unsafe {
            runtime.release(value);
            runtime.release(value);
        }
        assert_eq!(runtime.release_count(value), 2);
        assert_eq!(runtime.stats().double_releases, 1);
    }

    #[test]
    fn test_set_value_replaces_and_releases_previous() {
        let runtime = MemoryRuntime::new();
        let key = uid(&runtime, "key.name");
        let dict = unsafe { runtime.dictionary_create(&[], &[]) }.unwrap();
        let first = runtime.string_create("first").unwrap();
        let second = runtime.string_create("second").unwrap();

        unsafe {
            runtime.dictionary_set_value(dict, key, first);
            runtime.release(first);
            runtime.dictionary_set_value(dict, key, second);
        }
        assert!(!runtime.is_live(first));
        assert_eq!(runtime.refcount(second), 2);

        let mut text = String::new();
        runtime.state().render(token_of(dict), 0, &mut text);
        assert_eq!(text, "{\n  key.name: \"second\"\n}");
    }

    #[test]
    fn test_render_nested_request() {
        let runtime = MemoryRuntime::new();
        let request = uid(&runtime, "key.request");
        let args = uid(&runtime, "key.compilerargs");
        let kind = uid(&runtime, "source.request.cursorinfo");

        let kind_value = runtime.uid_create(kind).unwrap();
        let arg = runtime.string_create("-sdk").unwrap();
        let array = unsafe { runtime.array_create(&[Some(arg), None]) }.unwrap();
        let dict =
            unsafe { runtime.dictionary_create(&[Some(request), Some(args)], &[Some(kind_value), Some(array)]) }
                .unwrap();

        let mut text = String::new();
        runtime.state().render(token_of(dict), 0, &mut text);
        assert_eq!(
            text,
            "{\n  key.request: source.request.cursorinfo,\n  key.compilerargs: [\n    \"-sdk\",\n    <null>\n  ]\n}"
        );
    }

    #[test]
    fn test_quoted_strings_are_escaped() {
        let mut out = String::new();
        push_quoted(&mut out, "say \"hi\"\n\\");
        assert_eq!(out, r#""say \"hi\"\n\\""#);
    }

    #[test]
    fn test_allocation_budget_refuses_after_exhaustion() {
        let runtime = MemoryRuntime::new();
        runtime.set_allocation_budget(Some(1));
        assert!(runtime.int64_create(1).is_some());
        assert!(runtime.int64_create(2).is_none());
        assert_eq!(runtime.stats().refused_allocations, 1);

        runtime.set_allocation_budget(None);
        assert!(runtime.int64_create(3).is_some());
    }

    #[test]
    fn test_description_buffer_round_trip() {
        let runtime = MemoryRuntime::new();
        let value = runtime.int64_create(42).unwrap();
        let buffer = unsafe { runtime.description_copy(value) }.unwrap();
        assert_eq!(runtime.stats().outstanding_descriptions, 1);

        unsafe { runtime.description_free(buffer) };
        let stats = runtime.stats();
        assert_eq!(stats.outstanding_descriptions, 0);
        assert_eq!(stats.descriptions_copied, 1);
        assert_eq!(stats.invalid_accesses, 0);
    }
}
