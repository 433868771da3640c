//! Pretty-printing SPIR-V instructions, in a `spirv-dis`-like form.
//!
//! Operands are printed as plain words, as they aren't typed (IDs and
//! literals are indistinguishable without the full SPIR-V grammar).

use crate::spv::{self, shape};
use itertools::Itertools;
use std::fmt;

impl fmt::Display for spv::Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let is_value = shape::shape_of(self.opcode).map_or(false, |s| {
            s.has_result_id && s.tail != shape::Tail::Labels && !s.has_name
                || self.opcode == spv::Op::ExtInstImport
                || self.opcode == spv::Op::String
        });

        // HACK: only "real" results get the `%id = ` prefix, the leading
        // words of e.g. `OpName` are printed as regular operands instead.
        let mut leading = vec![];
        match (is_value, self.result_type_id, self.result_id) {
            (true, Some(ty), Some(id)) => write!(f, "%{id} = Op{:?} %{ty}", self.opcode)?,
            (true, None, Some(id)) => write!(f, "%{id} = Op{:?}", self.opcode)?,
            (_, ty, id) => {
                write!(f, "Op{:?}", self.opcode)?;
                leading.extend(ty.into_iter().chain(id));
            }
        }

        for word in leading {
            write!(f, " {word}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " {name:?}")?;
        }
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.iter().join(" "))?;
        }
        if let Some(labels) = &self.labels {
            for (literal, label) in labels {
                write!(f, " {literal} %{label}")?;
            }
        }
        Ok(())
    }
}
