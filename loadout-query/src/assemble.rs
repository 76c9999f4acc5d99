//! Result assembly: one output row per record, holding exactly the selected keys.

use loadout_schema::{AttributeImpl, Cardinality, LoadedAssociation, Record, Row, Value};

use crate::resolver::{ProjectionResolver, ResolvedSelection};

/// Assemble the output rows of a record batch, in record order.
pub fn assemble(selection: &ResolvedSelection, records: &[Record]) -> Vec<Row> {
    records.iter().map(|r| assemble_row(selection, r)).collect()
}

/// Assemble one output row.
///
/// Keys are the selected attributes in declaration order, followed by the
/// selected associations in request order. Columns fetched only to satisfy
/// dependencies or join keys are left out.
pub fn assemble_row(selection: &ResolvedSelection, record: &Record) -> Row {
    let schema = selection.schema.as_ref();
    let mut row = Row::with_capacity(selection.attributes.len() + selection.associations.len());

    for name in &selection.attributes {
        let Some(attribute) = schema.attribute(name) else {
            continue;
        };
        let value = match &attribute.implementation {
            AttributeImpl::Column | AttributeImpl::Query(_) => {
                record.get(name).cloned().unwrap_or_default()
            }
            AttributeImpl::Computed(compute) => compute(record),
            AttributeImpl::BatchLoaded(_) | AttributeImpl::Nested(_) => {
                record.loaded_value(name).cloned().unwrap_or_default()
            }
        };
        row.insert(name.clone(), value);
    }

    for (name, nested) in &selection.associations {
        let value = match record.association(name) {
            Some(LoadedAssociation::One(Some(related))) => {
                Value::Object(assemble_row(nested, related))
            }
            Some(LoadedAssociation::One(None)) => Value::Null,
            Some(LoadedAssociation::Many(related)) => Value::List(
                related
                    .iter()
                    .map(|r| Value::Object(assemble_row(nested, r)))
                    .collect(),
            ),
            None => match schema.association(name).map(|a| a.cardinality) {
                Some(Cardinality::Many) => Value::List(Vec::new()),
                _ => Value::Null,
            },
        };
        row.insert(name.clone(), value);
    }
    row
}

/// Check if already materialized records cover a selection without a refetch.
///
/// Every record must be of the selection's entity and hold every column the
/// selection's fetch plan needs. Associations must be loaded on every record,
/// recursively for the related records.
pub fn can_upgrade(
    resolver: &ProjectionResolver<'_>,
    selection: &ResolvedSelection,
    records: &[Record],
) -> bool {
    let plan = resolver.plan(selection);
    let covered = records.iter().all(|record| {
        record.entity() == selection.entity()
            && plan.column_names().all(|column| record.has_column(column))
    });
    if !covered {
        return false;
    }

    selection.associations.iter().all(|(name, nested)| {
        let mut related = Vec::new();
        for record in records {
            match record.association(name) {
                Some(loaded) => related.extend(loaded.records().cloned()),
                None => return false,
            }
        }
        can_upgrade(resolver, nested, &related)
    })
}
