use std::rc::Rc;

use crate::runtime::{
    host_api::{HashedHostApi, HostApi, HostFn, HostScope, LinearHostApi},
    script::ThreadHandle,
    vm::Vm,
};

fn noop() -> HostFn {
    Rc::new(|_: &mut Vm, _: ThreadHandle| {})
}

fn registries() -> Vec<Box<dyn HostApi>> {
    vec![
        Box::new(LinearHostApi::new()) as Box<dyn HostApi>,
        Box::new(HashedHostApi::new()),
    ]
}

#[test]
fn names_resolve_ignoring_case() {
    for mut api in registries() {
        let f = noop();
        api.register(HostScope::Global, "PrintString", f.clone());

        let found = api.resolve("PRINTSTRING", ThreadHandle(3)).unwrap();
        assert!(Rc::ptr_eq(&found, &f));
        assert!(api.resolve("PrintInt", ThreadHandle(3)).is_none());
    }
}

#[test]
fn thread_scope_hides_function_from_other_threads() {
    for mut api in registries() {
        api.register(HostScope::Thread(ThreadHandle(1)), "Secret", noop());

        assert!(api.resolve("Secret", ThreadHandle(1)).is_some());
        assert!(api.resolve("Secret", ThreadHandle(2)).is_none());
    }
}

#[test]
fn earlier_registration_wins_across_scopes() {
    for mut api in registries() {
        let global = noop();
        let scoped = noop();
        api.register(HostScope::Global, "Log", global.clone());
        api.register(HostScope::Thread(ThreadHandle(0)), "log", scoped.clone());

        let found = api.resolve("Log", ThreadHandle(0)).unwrap();
        assert!(Rc::ptr_eq(&found, &global));
        assert_eq!(api.len(), 2);
    }
}

#[test]
fn reregistering_in_same_scope_replaces_in_place() {
    for mut api in registries() {
        let first = noop();
        let second = noop();
        let scoped = noop();
        api.register(HostScope::Global, "Tick", first);
        api.register(HostScope::Thread(ThreadHandle(0)), "Tick", scoped);
        api.register(HostScope::Global, "TICK", second.clone());

        let found = api.resolve("tick", ThreadHandle(0)).unwrap();
        assert!(Rc::ptr_eq(&found, &second));
        assert_eq!(api.len(), 2);
    }
}

#[test]
fn remove_thread_drops_only_that_threads_functions() {
    for mut api in registries() {
        api.register(HostScope::Global, "Shared", noop());
        api.register(HostScope::Thread(ThreadHandle(4)), "Mine", noop());
        api.register(HostScope::Thread(ThreadHandle(5)), "Yours", noop());

        api.remove_thread(ThreadHandle(4));

        assert!(api.resolve("Mine", ThreadHandle(4)).is_none());
        assert!(api.resolve("Shared", ThreadHandle(4)).is_some());
        assert!(api.resolve("Yours", ThreadHandle(5)).is_some());
        assert_eq!(api.len(), 2);

        api.clear();
        assert!(api.is_empty());
    }
}
