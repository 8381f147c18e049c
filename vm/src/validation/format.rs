// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::bytecode::{ContractModule, Instruction, MethodDef, ParamType, TypeDef, TypeKind};

use super::{ValidationError, ValidationKind, ALLOWED_ASSEMBLIES};

/// Structural validation: constructor shape, declared types, parameter
/// types, field mutability, assembly references.
pub fn validate_format(module: &ContractModule) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for reference in &module.assembly_refs {
        if !ALLOWED_ASSEMBLIES.contains(&reference.as_str()) {
            errors.push(ValidationError::new(
                ValidationKind::AssemblyReference,
                reference,
                None,
                "assembly reference is not on the allow-list",
            ));
        }
    }

    for ty in &module.types {
        match ty.kind {
            TypeKind::Contract => validate_contract_type(module, ty, &mut errors),
            TypeKind::ValueStruct => validate_common(module, ty, &mut errors),
            TypeKind::RefClass => {
                errors.push(ValidationError::new(
                    ValidationKind::ReferenceTypeDeclaration,
                    &ty.name,
                    None,
                    "only value-type nested declarations are allowed",
                ));
            }
        }
    }

    errors
}

fn validate_contract_type(module: &ContractModule, ty: &TypeDef, errors: &mut Vec<ValidationError>) {
    let ctors: Vec<&MethodDef> = ty.methods.iter().filter(|m| m.is_constructor).collect();
    match ctors.len() {
        1 => {
            let ctor = ctors[0];
            if ctor.params.first() != Some(&ParamType::Context) {
                errors.push(ValidationError::new(
                    ValidationKind::ConstructorContextParam,
                    &ty.name,
                    Some(&ctor.name),
                    "constructor's leading parameter must be the context-injection type",
                ));
            }
        }
        n => {
            errors.push(ValidationError::new(
                ValidationKind::ConstructorCount,
                &ty.name,
                None,
                format!("contract type declares {n} constructors, expected exactly 1"),
            ));
        }
    }

    validate_common(module, ty, errors);
}

fn validate_common(module: &ContractModule, ty: &TypeDef, errors: &mut Vec<ValidationError>) {
    for field in &ty.fields {
        if field.is_static && field.is_mutable {
            errors.push(ValidationError::new(
                ValidationKind::MutableStaticField,
                &ty.name,
                None,
                format!("field `{}` is a mutable static", field.name),
            ));
        }
    }

    for method in &ty.methods {
        validate_method_params(ty, method, errors);
        validate_body(module, ty, method, errors);
    }
}

fn validate_method_params(ty: &TypeDef, method: &MethodDef, errors: &mut Vec<ValidationError>) {
    // The parameter type grammar is already closed over the allowed
    // primitive set plus single-dimensional arrays of it; the one structural
    // violation left is the context type outside a constructor's leading
    // position.
    for (i, param) in method.params.iter().enumerate() {
        let context_leading = method.is_constructor && i == 0;
        if *param == ParamType::Context && !context_leading {
            errors.push(ValidationError::new(
                ValidationKind::ParameterType,
                &ty.name,
                Some(&method.name),
                format!(
                    "parameter {i} uses the context type outside a constructor's leading position"
                ),
            ));
        }
    }
}

fn validate_body(
    module: &ContractModule,
    ty: &TypeDef,
    method: &MethodDef,
    errors: &mut Vec<ValidationError>,
) {
    for instruction in &method.body {
        match instruction {
            Instruction::ChargeGas(_) => {
                errors.push(ValidationError::new(
                    ValidationKind::MeteringInstruction,
                    &ty.name,
                    Some(&method.name),
                    "input modules must not carry metering instructions",
                ));
            }
            Instruction::NewObject(target) => {
                let constructed = module.type_def(target);
                match constructed {
                    Some(t) if t.kind == TypeKind::ValueStruct => {}
                    Some(t) => errors.push(ValidationError::new(
                        ValidationKind::ReferenceTypeConstruction,
                        &ty.name,
                        Some(&method.name),
                        format!("explicit construction of reference type `{}`", t.name),
                    )),
                    None => errors.push(ValidationError::new(
                        ValidationKind::ReferenceTypeConstruction,
                        &ty.name,
                        Some(&method.name),
                        format!("construction of unknown type `{target}`"),
                    )),
                }
            }
            _ => {}
        }
    }
}
