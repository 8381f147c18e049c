// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashSet;

use crate::bytecode::{ContractModule, Instruction, MethodDef, TypeDef, TypeKind};

use super::{ValidationError, ValidationKind, ALLOWED_EXTERN_NAMESPACES};

/// Rejects every construct that can diverge across validator nodes,
/// anywhere reachable from a contract type. Each defect is reported
/// individually, attributed to its declaring method, in declaration order.
pub fn validate_determinism(module: &ContractModule) -> Vec<ValidationError> {
    let reachable = reachable_methods(module);
    let mut errors = Vec::new();

    for ty in &module.types {
        let type_reachable = ty.kind == TypeKind::Contract
            || ty
                .methods
                .iter()
                .any(|m| reachable.contains(&key(&ty.name, &m.name)));
        if !type_reachable {
            continue;
        }

        if ty.generic_params > 0 {
            errors.push(ValidationError::new(
                ValidationKind::GenericType,
                &ty.name,
                None,
                format!("type declares {} generic parameters", ty.generic_params),
            ));
        }

        for method in &ty.methods {
            if ty.kind != TypeKind::Contract && !reachable.contains(&key(&ty.name, &method.name)) {
                continue;
            }
            check_method(ty, method, &mut errors);
        }
    }

    errors
}

fn key(type_name: &str, method_name: &str) -> String {
    format!("{type_name}::{method_name}")
}

/// Transitive closure over same-module calls, seeded with every method of
/// every contract type. Helper methods on value structs only matter when
/// something actually calls them.
fn reachable_methods(module: &ContractModule) -> HashSet<String> {
    let mut reachable = HashSet::new();
    let mut work: Vec<(String, String)> = Vec::new();

    for ty in module.contract_types() {
        for method in &ty.methods {
            work.push((ty.name.clone(), method.name.clone()));
        }
    }

    while let Some((type_name, method_name)) = work.pop() {
        if !reachable.insert(key(&type_name, &method_name)) {
            continue;
        }
        let Some(method) = module
            .type_def(&type_name)
            .and_then(|t| t.method(&method_name))
        else {
            continue;
        };
        for instruction in &method.body {
            if let Instruction::CallMethod(target) = instruction {
                let (callee_type, callee_method) = match target.split_once("::") {
                    Some((t, m)) => (t.to_string(), m.to_string()),
                    None => (type_name.clone(), target.clone()),
                };
                work.push((callee_type, callee_method));
            }
        }
    }

    reachable
}

fn check_method(ty: &TypeDef, method: &MethodDef, errors: &mut Vec<ValidationError>) {
    if method.is_generic {
        errors.push(ValidationError::new(
            ValidationKind::GenericMethod,
            &ty.name,
            Some(&method.name),
            "generic methods are not permitted",
        ));
    }

    for instruction in &method.body {
        match instruction {
            Instruction::Float(op) => errors.push(error_at(
                ValidationKind::FloatingPoint,
                ty,
                method,
                format!("floating-point operation {op:?}"),
            )),
            Instruction::CallExtern(name) => {
                let namespace = name.rsplit_once('.').map(|(ns, _)| ns).unwrap_or(name);
                if !ALLOWED_EXTERN_NAMESPACES
                    .iter()
                    .any(|allowed| namespace == *allowed || namespace.starts_with(&format!("{allowed}.")))
                {
                    errors.push(error_at(
                        ValidationKind::DisallowedNamespace,
                        ty,
                        method,
                        format!("call into disallowed namespace `{namespace}`"),
                    ));
                }
            }
            Instruction::NewMultiArray(dims) => errors.push(error_at(
                ValidationKind::MultiDimensionalArray,
                ty,
                method,
                format!("{dims}-dimensional array allocation"),
            )),
            Instruction::ArrayClone => errors.push(error_at(
                ValidationKind::ArrayClone,
                ty,
                method,
                "array cloning",
            )),
            Instruction::TryBegin(_) => errors.push(error_at(
                ValidationKind::TryCatch,
                ty,
                method,
                "structured exception handling",
            )),
            Instruction::StoreStaticField(field) => errors.push(error_at(
                ValidationKind::StaticFieldWrite,
                ty,
                method,
                format!("write to static field `{field}`"),
            )),
            _ => {}
        }
    }
}

fn error_at(
    kind: ValidationKind,
    ty: &TypeDef,
    method: &MethodDef,
    message: impl Into<String>,
) -> ValidationError {
    ValidationError::new(kind, &ty.name, Some(&method.name), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{FloatOp, ParamType, Visibility};

    fn method(name: &str, body: Vec<Instruction>) -> MethodDef {
        MethodDef {
            name: name.into(),
            visibility: Visibility::Public,
            is_constructor: false,
            is_generic: false,
            params: vec![],
            locals: 0,
            body,
        }
    }

    fn contract(methods: Vec<MethodDef>) -> ContractModule {
        ContractModule {
            assembly_refs: vec![],
            types: vec![TypeDef {
                name: "C".into(),
                kind: TypeKind::Contract,
                generic_params: 0,
                fields: vec![],
                methods,
            }],
        }
    }

    fn ctor() -> MethodDef {
        MethodDef {
            name: ".ctor".into(),
            visibility: Visibility::Public,
            is_constructor: true,
            is_generic: false,
            params: vec![ParamType::Context],
            locals: 0,
            body: vec![Instruction::Return],
        }
    }

    #[test]
    fn clean_module_passes() {
        let module = contract(vec![
            ctor(),
            method(
                "transfer",
                vec![
                    Instruction::LoadArg(0),
                    Instruction::PushU64(1),
                    Instruction::Add,
                    Instruction::Return,
                ],
            ),
        ]);
        assert!(validate_determinism(&module).is_empty());
    }

    #[test]
    fn k_defects_in_k_methods_yield_k_errors_in_declaration_order() {
        let module = contract(vec![
            ctor(),
            method("a", vec![Instruction::Float(FloatOp::Add), Instruction::Return]),
            method(
                "b",
                vec![
                    Instruction::CallExtern("System.DateTime.get_Now".into()),
                    Instruction::Return,
                ],
            ),
            method("c", vec![Instruction::NewMultiArray(2), Instruction::Return]),
            method("d", vec![Instruction::ArrayClone, Instruction::Return]),
            method("e", vec![Instruction::TryBegin(1), Instruction::TryEnd]),
            method(
                "f",
                vec![Instruction::StoreStaticField("x".into()), Instruction::Return],
            ),
        ]);
        let errors = validate_determinism(&module);
        let kinds: Vec<ValidationKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ValidationKind::FloatingPoint,
                ValidationKind::DisallowedNamespace,
                ValidationKind::MultiDimensionalArray,
                ValidationKind::ArrayClone,
                ValidationKind::TryCatch,
                ValidationKind::StaticFieldWrite,
            ]
        );
        let methods: Vec<Option<String>> =
            errors.iter().map(|e| e.method_name.clone()).collect();
        assert_eq!(
            methods,
            ["a", "b", "c", "d", "e", "f"]
                .iter()
                .map(|m| Some(m.to_string()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn allowed_namespace_is_not_flagged() {
        let module = contract(vec![
            ctor(),
            method(
                "hash",
                vec![
                    Instruction::CallExtern("Contract.Hash256".into()),
                    Instruction::Return,
                ],
            ),
        ]);
        assert!(validate_determinism(&module).is_empty());
    }

    #[test]
    fn generic_method_is_flagged() {
        let mut m = method("g", vec![Instruction::Return]);
        m.is_generic = true;
        let errors = validate_determinism(&contract(vec![ctor(), m]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::GenericMethod);
    }

    #[test]
    fn unreachable_struct_helper_is_ignored_until_called() {
        let mut module = contract(vec![ctor()]);
        module.types.push(TypeDef {
            name: "Helper".into(),
            kind: TypeKind::ValueStruct,
            generic_params: 0,
            fields: vec![],
            methods: vec![method("bad", vec![Instruction::Float(FloatOp::Div)])],
        });
        assert!(validate_determinism(&module).is_empty());

        // Once the contract calls into it, the defect is reachable and
        // reported.
        module.types[0]
            .methods
            .push(method("go", vec![Instruction::CallMethod("Helper::bad".into())]));
        let errors = validate_determinism(&module);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::FloatingPoint);
        assert_eq!(errors[0].type_name, "Helper");
    }
}
