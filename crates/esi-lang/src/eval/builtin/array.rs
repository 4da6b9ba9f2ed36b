use std::cmp::Ordering;

use smol_str::SmolStr;

use super::string::{clamp, integer, relative};
use super::{BuiltinFunction, Error, arg};
use crate::eval::Evaluator;
use crate::eval::heap::ArrayId;
use crate::eval::runtime_value::RuntimeValue;

pub(super) const METHODS: [BuiltinFunction; 28] = [
    BuiltinFunction::new("push", 1, |ev, this, args| {
        let id = this_array(this)?;
        let items = ev.heap.array_mut(id);
        items.extend_from_slice(args);
        Ok(items.len().into())
    }),
    BuiltinFunction::new("pop", 0, |ev, this, _| {
        let id = this_array(this)?;
        Ok(ev.heap.array_mut(id).pop().unwrap_or_default())
    }),
    BuiltinFunction::new("shift", 0, |ev, this, _| {
        let id = this_array(this)?;
        let items = ev.heap.array_mut(id);
        Ok(if items.is_empty() {
            RuntimeValue::Undefined
        } else {
            items.remove(0)
        })
    }),
    BuiltinFunction::new("unshift", 1, |ev, this, args| {
        let id = this_array(this)?;
        let items = ev.heap.array_mut(id);
        items.splice(0..0, args.iter().cloned());
        Ok(items.len().into())
    }),
    BuiltinFunction::new("slice", 2, |ev, this, args| {
        let id = this_array(this)?;
        let len = ev.heap.array(id).len();
        let start = relative(integer(ev, &arg(args, 0), 0.0)?, len);
        let end = relative(integer(ev, &arg(args, 1), len as f64)?, len);
        let items = ev
            .heap
            .array(id)
            .get(start..end.max(start))
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        Ok(ev.heap.alloc_array(items).into())
    }),
    BuiltinFunction::new("splice", 2, |ev, this, args| {
        let id = this_array(this)?;
        let len = ev.heap.array(id).len();
        let start = relative(integer(ev, &arg(args, 0), 0.0)?, len);
        let delete_count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => clamp(integer(ev, &arg(args, 1), 0.0)?, len - start),
        };
        let inserted = args.get(2..).unwrap_or_default().to_vec();
        let removed = ev
            .heap
            .array_mut(id)
            .splice(start..start + delete_count, inserted)
            .collect();
        Ok(ev.heap.alloc_array(removed).into())
    }),
    BuiltinFunction::new("concat", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut items = ev.heap.array(id).clone();
        for value in args {
            match value {
                RuntimeValue::Array(other) => items.extend_from_slice(ev.heap.array(*other)),
                value => items.push(value.clone()),
            }
        }
        Ok(ev.heap.alloc_array(items).into())
    }),
    BuiltinFunction::new("join", 1, |ev, this, args| {
        let separator = match arg(args, 0) {
            RuntimeValue::Undefined => SmolStr::new_static(","),
            separator => ev.to_string(&separator)?,
        };
        this_array(this)?;
        Ok(ev.join_array(this, &separator)?.into())
    }),
    BuiltinFunction::new("toString", 0, |ev, this, _| {
        this_array(this)?;
        Ok(ev.join_array(this, ",")?.into())
    }),
    BuiltinFunction::new("indexOf", 1, |ev, this, args| {
        let id = this_array(this)?;
        let target = arg(args, 0);
        let items = ev.heap.array(id);
        Ok(items
            .iter()
            .position(|item| *item == target)
            .map_or(-1.0, |i| i as f64)
            .into())
    }),
    BuiltinFunction::new("lastIndexOf", 1, |ev, this, args| {
        let id = this_array(this)?;
        let target = arg(args, 0);
        let items = ev.heap.array(id);
        Ok(items
            .iter()
            .rposition(|item| *item == target)
            .map_or(-1.0, |i| i as f64)
            .into())
    }),
    BuiltinFunction::new("includes", 1, |ev, this, args| {
        let id = this_array(this)?;
        let target = arg(args, 0);
        Ok(ev
            .heap
            .array(id)
            .iter()
            .any(|item| same_value_zero(item, &target))
            .into())
    }),
    BuiltinFunction::new("reverse", 0, |ev, this, _| {
        let id = this_array(this)?;
        ev.heap.array_mut(id).reverse();
        Ok(this.clone())
    }),
    BuiltinFunction::new("fill", 1, |ev, this, args| {
        let id = this_array(this)?;
        let len = ev.heap.array(id).len();
        let start = relative(integer(ev, &arg(args, 1), 0.0)?, len);
        let end = relative(integer(ev, &arg(args, 2), len as f64)?, len);
        let value = arg(args, 0);
        if let Some(slots) = ev.heap.array_mut(id).get_mut(start..end.max(start)) {
            slots.fill(value);
        }
        Ok(this.clone())
    }),
    BuiltinFunction::new("map", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut result = Vec::with_capacity(ev.heap.array(id).len());
        for_each(ev, id, args, |_, _, value| {
            result.push(value);
            Ok(true)
        })?;
        Ok(ev.heap.alloc_array(result).into())
    }),
    BuiltinFunction::new("filter", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut result = Vec::new();
        for_each(ev, id, args, |_, item, keep| {
            if keep.is_truthy() {
                result.push(item);
            }
            Ok(true)
        })?;
        Ok(ev.heap.alloc_array(result).into())
    }),
    BuiltinFunction::new("forEach", 1, |ev, this, args| {
        let id = this_array(this)?;
        for_each(ev, id, args, |_, _, _| Ok(true))?;
        Ok(RuntimeValue::Undefined)
    }),
    BuiltinFunction::new("some", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut found = false;
        for_each(ev, id, args, |_, _, result| {
            found = result.is_truthy();
            Ok(!found)
        })?;
        Ok(found.into())
    }),
    BuiltinFunction::new("every", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut all = true;
        for_each(ev, id, args, |_, _, result| {
            all = result.is_truthy();
            Ok(all)
        })?;
        Ok(all.into())
    }),
    BuiltinFunction::new("find", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut found = RuntimeValue::Undefined;
        for_each(ev, id, args, |_, item, result| {
            if result.is_truthy() {
                found = item;
                return Ok(false);
            }
            Ok(true)
        })?;
        Ok(found)
    }),
    BuiltinFunction::new("findIndex", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut found = -1.0;
        for_each(ev, id, args, |index, _, result| {
            if result.is_truthy() {
                found = index as f64;
                return Ok(false);
            }
            Ok(true)
        })?;
        Ok(found.into())
    }),
    BuiltinFunction::new("reduce", 1, |ev, this, args| {
        let id = this_array(this)?;
        let callback = arg(args, 0);
        callable(ev, &callback)?;

        let mut index = 0;
        let mut accumulator = match args.get(1) {
            Some(initial) => initial.clone(),
            None => {
                let Some(first) = ev.heap.array(id).first().cloned() else {
                    return Err(Error::TypeError(
                        "Reduce of empty array with no initial value".to_string(),
                    ));
                };
                index = 1;
                first
            }
        };
        while let Some(item) = ev.heap.array(id).get(index).cloned() {
            accumulator = ev.call_value(
                &callback,
                RuntimeValue::Undefined,
                vec![accumulator, item, index.into(), this.clone()],
                None,
            )?;
            index += 1;
        }
        Ok(accumulator)
    }),
    BuiltinFunction::new("flat", 0, |ev, this, args| {
        let id = this_array(this)?;
        let depth = integer(ev, &arg(args, 0), 1.0)?;
        let mut result = Vec::new();
        flatten(ev, id, depth, &mut result);
        Ok(ev.heap.alloc_array(result).into())
    }),
    BuiltinFunction::new("flatMap", 1, |ev, this, args| {
        let id = this_array(this)?;
        let mut mapped = Vec::new();
        for_each(ev, id, args, |_, _, value| {
            mapped.push(value);
            Ok(true)
        })?;
        let mut result = Vec::with_capacity(mapped.len());
        for value in mapped {
            match value {
                RuntimeValue::Array(inner) => result.extend_from_slice(ev.heap.array(inner)),
                value => result.push(value),
            }
        }
        Ok(ev.heap.alloc_array(result).into())
    }),
    BuiltinFunction::new("sort", 1, |ev, this, args| {
        let id = this_array(this)?;
        let comparator = arg(args, 0);
        if !comparator.is_undefined() {
            callable(ev, &comparator)?;
        }

        // undefined always sorts last and is never passed to the comparator
        let (mut defined, undefined): (Vec<_>, Vec<_>) = ev
            .heap
            .array(id)
            .iter()
            .cloned()
            .partition(|item| !item.is_undefined());
        defined = merge_sort(ev, defined, &comparator)?;
        defined.extend(undefined);
        *ev.heap.array_mut(id) = defined;
        Ok(this.clone())
    }),
    BuiltinFunction::new("at", 1, |ev, this, args| {
        let id = this_array(this)?;
        let len = ev.heap.array(id).len() as f64;
        let index = integer(ev, &arg(args, 0), 0.0)?;
        let index = if index < 0.0 { index + len } else { index };
        if index < 0.0 || index >= len {
            return Ok(RuntimeValue::Undefined);
        }
        Ok(ev.heap.array(id)[index as usize].clone())
    }),
    BuiltinFunction::new("keys", 0, |ev, this, _| {
        let id = this_array(this)?;
        let keys = (0..ev.heap.array(id).len()).map(RuntimeValue::from).collect();
        Ok(ev.heap.alloc_array(keys).into())
    }),
    BuiltinFunction::new("entries", 0, |ev, this, _| {
        let id = this_array(this)?;
        let items = ev.heap.array(id).clone();
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| RuntimeValue::Array(ev.heap.alloc_array(vec![i.into(), item])))
            .collect();
        Ok(ev.heap.alloc_array(entries).into())
    }),
];

fn this_array(this: &RuntimeValue) -> Result<ArrayId, Error> {
    match this {
        RuntimeValue::Array(id) => Ok(*id),
        _ => Err(Error::TypeError(
            "Array.prototype method called on a non-array".to_string(),
        )),
    }
}

fn callable(ev: &Evaluator, value: &RuntimeValue) -> Result<(), Error> {
    if value.is_function() {
        Ok(())
    } else {
        Err(Error::TypeError(format!("{} is not a function", ev.inspect(value))))
    }
}

/// Runs the callback in `args[0]` over the array, reading elements live so that
/// mutation from inside the callback is observed.
///
/// `visit` receives the index, the element and the callback's result and returns
/// whether to keep going.
fn for_each(
    ev: &mut Evaluator,
    id: ArrayId,
    args: &[RuntimeValue],
    mut visit: impl FnMut(usize, RuntimeValue, RuntimeValue) -> Result<bool, Error>,
) -> Result<(), Error> {
    let callback = arg(args, 0);
    callable(ev, &callback)?;
    let this = arg(args, 1);
    let len = ev.heap.array(id).len();

    for index in 0..len {
        let Some(item) = ev.heap.array(id).get(index).cloned() else {
            break;
        };
        let result = ev.call_value(
            &callback,
            this.clone(),
            vec![item.clone(), index.into(), RuntimeValue::Array(id)],
            None,
        )?;
        if !visit(index, item, result)? {
            break;
        }
    }
    Ok(())
}

fn same_value_zero(a: &RuntimeValue, b: &RuntimeValue) -> bool {
    match (a, b) {
        (RuntimeValue::Number(a), RuntimeValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (a, b) => a == b,
    }
}

fn flatten(ev: &Evaluator, id: ArrayId, depth: f64, result: &mut Vec<RuntimeValue>) {
    for item in ev.heap.array(id) {
        match item {
            RuntimeValue::Array(inner) if depth >= 1.0 => flatten(ev, *inner, depth - 1.0, result),
            item => result.push(item.clone()),
        }
    }
}

/// Stable merge sort whose comparisons may call back into script code.
fn merge_sort(
    ev: &mut Evaluator,
    mut items: Vec<RuntimeValue>,
    comparator: &RuntimeValue,
) -> Result<Vec<RuntimeValue>, Error> {
    if items.len() <= 1 {
        return Ok(items);
    }

    let right = items.split_off(items.len() / 2);
    let left = merge_sort(ev, items, comparator)?;
    let right = merge_sort(ev, right, comparator)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if compare(ev, a, b, comparator)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn compare(
    ev: &mut Evaluator,
    a: &RuntimeValue,
    b: &RuntimeValue,
    comparator: &RuntimeValue,
) -> Result<Ordering, Error> {
    if comparator.is_undefined() {
        let a = ev.to_string(a)?;
        let b = ev.to_string(b)?;
        return Ok(a.cmp(&b));
    }

    let result = ev.call_value(
        comparator,
        RuntimeValue::Undefined,
        vec![a.clone(), b.clone()],
        None,
    )?;
    let n = ev.to_number(&result)?.value();
    Ok(if n > 0.0 {
        Ordering::Greater
    } else if n < 0.0 {
        Ordering::Less
    } else {
        Ordering::Equal
    })
}
