// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Bindings to the TestU01 batteries.
//!
//! TestU01 pulls bits through function pointers stored in a `unif01_Gen`.
//! The struct is filled in here directly instead of going through
//! `unif01_CreateExternGenBits`, so the generator travels in the `state`
//! pointer and no global state is needed.
//! Requires libtestu01, libprobdist and libmylib on the linker path.

use std::{
    ffi::{c_char, c_ulong, c_void, CString},
    ptr,
};

use log::info;

use crate::{
    battery::{Battery, BatteryKind},
    error::{Error, Result},
    words::Generator,
};

/// Mirrors `unif01_Gen` from unif01.h.
#[repr(C)]
struct Unif01Gen {
    state: *mut c_void,
    param: *mut c_void,
    name: *mut c_char,
    get_u01: unsafe extern "C" fn(param: *mut c_void, state: *mut c_void) -> f64,
    get_bits: unsafe extern "C" fn(param: *mut c_void, state: *mut c_void) -> c_ulong,
    write: unsafe extern "C" fn(state: *mut c_void),
}

#[link(name = "testu01")]
#[link(name = "probdist")]
#[link(name = "mylib")]
extern "C" {
    fn bbattery_SmallCrush(gen: *mut Unif01Gen);
    fn bbattery_Crush(gen: *mut Unif01Gen);
    fn bbattery_BigCrush(gen: *mut Unif01Gen);
}

/// A failing source cannot be reported back through TestU01,
/// so the process ends here with the error's exit status.
fn abort_run(err: &Error) -> ! {
    eprintln!("{}", err);
    std::process::exit(err.exit_code() as i32)
}

/// `state` must point to the `Generator` installed by `TestU01Battery::run`.
unsafe extern "C" fn get_bits(_param: *mut c_void, state: *mut c_void) -> c_ulong {
    let gen = &mut *(state as *mut Generator<'_>);
    match gen.next_bits() {
        Ok(word) => word as c_ulong,
        Err(err) => abort_run(&err),
    }
}

unsafe extern "C" fn get_u01(_param: *mut c_void, state: *mut c_void) -> f64 {
    let gen = &mut *(state as *mut Generator<'_>);
    match gen.next_u01() {
        Ok(u) => u,
        Err(err) => abort_run(&err),
    }
}

unsafe extern "C" fn write_state(state: *mut c_void) {
    let gen = &*(state as *const Generator<'_>);
    println!("  {} words pulled, {} wraps", gen.pulled(), gen.wraps());
}

pub struct TestU01Battery {
    kind: BatteryKind,
}

impl TestU01Battery {
    pub fn new(kind: BatteryKind) -> Self {
        TestU01Battery { kind }
    }
}

impl Battery for TestU01Battery {
    fn name(&self) -> &str {
        self.kind.label()
    }

    fn run(&mut self, gen: &mut Generator<'_>) -> Result<()> {
        let name = CString::new(gen.name())
            .map_err(|_| Error::Config("generator name contains a NUL byte".to_owned()))?;
        info!("Running TestU01 {} on {}", self.kind, gen.name());
        let mut raw = Unif01Gen {
            state: gen as *mut Generator<'_> as *mut c_void,
            param: ptr::null_mut(),
            name: name.as_ptr() as *mut c_char,
            get_u01,
            get_bits,
            write: write_state,
        };
        // TestU01 only reads `name` and calls back into the generator
        // while the battery runs, both outlive the call.
        unsafe {
            match self.kind {
                BatteryKind::SmallCrush => bbattery_SmallCrush(&mut raw),
                BatteryKind::Crush => bbattery_Crush(&mut raw),
                BatteryKind::BigCrush => bbattery_BigCrush(&mut raw),
            }
        }
        Ok(())
    }
}
