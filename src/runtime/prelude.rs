//! Go support code for lowered go-bindings.
//!
//! Each bound name gets a `gxSync[T]`: a one-slot channel written exactly
//! once by the dispatched goroutine, and a `sync.Once` that lets exactly one
//! reader receive from it. Every other reader waits on the `Once` and then
//! sees the memoized outcome. A recorded failure re-panics on every read.

const SYNC_STATE_TEMPLATE: &str = r#"type {prefix}Outcome[T any] struct {
	value   T
	failure any
}

type {prefix}Sync[T any] struct {
	once    sync.Once
	ch      chan {prefix}Outcome[T]
	value   T
	failure any
}

func {prefix}NewSync[T any]() *{prefix}Sync[T] {
	return &{prefix}Sync[T]{ch: make(chan {prefix}Outcome[T], 1)}
}

func (s *{prefix}Sync[T]) put(value T) {
	s.ch <- {prefix}Outcome[T]{value: value}
}

func (s *{prefix}Sync[T]) fail(failure any) {
	s.ch <- {prefix}Outcome[T]{failure: failure}
}

func (s *{prefix}Sync[T]) get() T {
	s.once.Do(func() {
		outcome := <-s.ch
		s.value, s.failure = outcome.value, outcome.failure
	})
	if s.failure != nil {
		panic(s.failure)
	}
	return s.value
}
"#;

/// The support code with every identifier prefixed by `prefix`.
pub fn sync_state_source(prefix: &str) -> String {
    SYNC_STATE_TEMPLATE.replace("{prefix}", prefix)
}
