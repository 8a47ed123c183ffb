// SPDX-License-Identifier: Apache-2.0

//! The typed request/reply contract every module server speaks over its
//! [`openperf_channel::bus`] (spec.md section 4.1, 6.1).
//!
//! Per SPEC_FULL.md section 10, the in-process transport moves these enums by
//! value rather than the literal length-delimited byte frames spec.md section
//! 6.1 describes; the discriminant ordering below is still documented, as the
//! section requires, so a [`openperf_channel::wire::WireMessage`] adapter could
//! be written against it without guessing field order.

use crate::error::Error;
use crate::generator::Generator;
use crate::id::Id;
use crate::result::GeneratorResult;

/// Every operation a module's registry exposes (spec.md section 4.2), as the
/// request half of the bus contract.
///
/// Discriminants (part 0 of the wire framing, spec.md section 6.1):
/// `0=List 1=Get 2=Create 3=Erase 4=BulkCreate 5=BulkErase 6=Start 7=Stop
/// 8=Toggle 9=ResultList 10=ResultGet 11=ResultErase`.
#[derive(Debug, Clone)]
pub enum Request<C> {
    /// Discriminant 0.
    List,
    /// Discriminant 1. Payload: generator id.
    Get(Id),
    /// Discriminant 2. Payload: optional id (empty means "allocate one"), config.
    Create { id: Option<Id>, config: C },
    /// Discriminant 3. Payload: generator id.
    Erase(Id),
    /// Discriminant 4. Payload: a vector of (optional id, config) pairs,
    /// applied all-or-nothing.
    BulkCreate(Vec<(Option<Id>, C)>),
    /// Discriminant 5. Payload: a vector of generator ids, applied best-effort.
    BulkErase(Vec<Id>),
    /// Discriminant 6. Payload: generator id, optional dynamic-results snapshot.
    Start {
        id: Id,
        dynamic_results: Option<serde_json::Value>,
    },
    /// Discriminant 7. Payload: generator id.
    Stop(Id),
    /// Discriminant 8 (network, packet-generator modules only). Payload: the
    /// outgoing and incoming generator ids, optional dynamic-results snapshot.
    Toggle {
        out_id: Id,
        in_id: Id,
        dynamic_results: Option<serde_json::Value>,
    },
    /// Discriminant 9.
    ResultList,
    /// Discriminant 10. Payload: result id.
    ResultGet(Id),
    /// Discriminant 11. Payload: result id.
    ResultErase(Id),
}

/// The reply half of the bus contract, covering every [`Request`] variant's
/// successful outcome plus the shared error taxonomy (spec.md section 7).
///
/// Discriminants: `0=Generator 1=Generators 2=Result 3=Results
/// 4=BulkGenerators 5=BulkErased 6=Ok 7=Err`.
#[derive(Debug, Clone)]
pub enum Reply<C, S> {
    /// Discriminant 0. Reply to `Get`/`Create`/`Start` (result carried
    /// separately)/`Toggle`.
    Generator(Generator<C>),
    /// Discriminant 1. Reply to `List`.
    Generators(Vec<Generator<C>>),
    /// Discriminant 2. Reply to `Start`/`Toggle`/`ResultGet`.
    Result(GeneratorResult<S>),
    /// Discriminant 3. Reply to `ResultList`.
    Results(Vec<GeneratorResult<S>>),
    /// Discriminant 4. Reply to `BulkCreate`.
    BulkGenerators(Vec<Generator<C>>),
    /// Discriminant 5. Reply to `BulkErase`: the ids actually erased.
    BulkErased(Vec<Id>),
    /// Discriminant 6. Reply to `Erase`/`Stop`/`ResultErase`.
    Ok,
    /// Discriminant 7.
    Err(Error),
}

impl<C, S> From<Result<(), Error>> for Reply<C, S> {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Reply::Ok,
            Err(err) => Reply::Err(err),
        }
    }
}
