//! Native routine table
//!
//! Mirrors a registration table of `.Call` entry points: name, arity, and the
//! function pointer the host dispatches to.

use std::collections::HashMap;

use tracing::debug;

use super::interp::Interpreter;
use super::value::Value;
use crate::errors::RoutineError;

pub type RoutineFn = fn(&Interpreter, &[Value]) -> Value;

#[derive(Clone, Copy)]
pub struct Routine {
    pub name: &'static str,
    pub fun: RoutineFn,
    pub arity: usize,
}

impl Routine {
    pub const fn new(name: &'static str, fun: RoutineFn, arity: usize) -> Self {
        Self { name, fun, arity }
    }
}

impl std::fmt::Debug for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routine")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    routines: HashMap<&'static str, Routine>,
    packages: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package's routine table. Rejects names already taken.
    pub fn register_routines(&mut self, routines: &[Routine]) -> Result<(), RoutineError> {
        if let Some(dup) = routines.iter().find(|r| self.routines.contains_key(r.name)) {
            return Err(RoutineError::Duplicate {
                name: dup.name.to_string(),
            });
        }

        for routine in routines {
            debug!(event = "register_routine", name = routine.name, arity = routine.arity);
            self.routines.insert(routine.name, *routine);
        }
        Ok(())
    }

    pub(crate) fn mark_loaded(&mut self, package: &str) {
        self.packages.push(package.to_string());
    }

    pub fn is_loaded(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }

    /// Find a routine and check it accepts `argc` arguments.
    pub fn resolve(&self, name: &str, argc: usize) -> Result<Routine, RoutineError> {
        let routine = self.routines.get(name).ok_or_else(|| RoutineError::NotFound {
            name: name.to_string(),
        })?;

        if routine.arity != argc {
            return Err(RoutineError::Arity {
                name: name.to_string(),
                expected: routine.arity,
                got: argc,
            });
        }
        Ok(*routine)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}
