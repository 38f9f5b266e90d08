use proc_macro2::TokenStream;
use quote::quote;

use fieldguard_plan::{RoutineStep, SynthesizedPlans, TypeRoutine};

use super::{Emitter, Target, accessor, ident};
use crate::errors::{GenerationError, Result};

impl Emitter<'_> {
    /// `AsFieldValue` impls first, then the three functions of every routine.
    pub(super) fn routines(&self, plans: &SynthesizedPlans) -> Result<Vec<TokenStream>> {
        let runtime = &self.runtime;
        let mut items = Vec::with_capacity(plans.routines.len() * 4);
        for routine in &plans.routines {
            let ty = self.routine_type(routine)?;
            items.push(quote! {
                impl #runtime::AsFieldValue for #ty {
                    fn field_value(&self) -> #runtime::FieldValue<'_> {
                        #runtime::FieldValue::Object
                    }
                }
            });
        }
        for routine in &plans.routines {
            items.extend(self.routine(plans, routine)?);
        }
        Ok(items)
    }

    fn routine_type(&self, routine: &TypeRoutine) -> Result<syn::Type> {
        syn::parse_str::<syn::Type>(&routine.type_path)
            .map_err(|err| GenerationError::syntax("type", &routine.type_path, err))
    }

    fn routine(&self, plans: &SynthesizedPlans, routine: &TypeRoutine) -> Result<Vec<TokenStream>> {
        let runtime = &self.runtime;
        let ty = self.routine_type(routine)?;
        let own = Target::new(&routine.type_name, &routine.function)?;
        let (validate, seq, check, name) = (&own.validate, &own.seq, &own.check, &own.name);

        let steps = routine
            .steps
            .iter()
            .map(|step| self.routine_step(plans, step))
            .collect::<Result<Vec<_>>>()?;

        let single_doc = format!(" Validate one `{name}`; the value must be exactly that type.");
        let seq_doc = format!(" Validate a sequence of `{name}` with indexed member paths.");
        Ok(vec![
            quote! {
                #[doc = #single_doc]
                #[allow(dead_code)]
                pub fn #validate(
                    value: &dyn ::std::any::Any,
                    results: &mut ::std::vec::Vec<#runtime::ValidationResult>,
                ) -> ::std::result::Result<(), #runtime::ValidationFault> {
                    let value = #runtime::downcast::<#ty>(value)?;
                    #check(value, #name, results)
                }
            },
            quote! {
                #[doc = #seq_doc]
                #[allow(dead_code)]
                pub fn #seq<'a>(
                    values: impl ::std::iter::IntoIterator<Item = &'a #ty>,
                    results: &mut ::std::vec::Vec<#runtime::ValidationResult>,
                ) -> ::std::result::Result<(), #runtime::ValidationFault> {
                    for (index, value) in values.into_iter().enumerate() {
                        #check(value, &::std::format!("{}[{}]", #name, index), results)?;
                    }
                    ::std::result::Result::Ok(())
                }
            },
            quote! {
                #[allow(dead_code, unused_variables)]
                fn #check(
                    value: &#ty,
                    path: &str,
                    results: &mut ::std::vec::Vec<#runtime::ValidationResult>,
                ) -> ::std::result::Result<(), #runtime::ValidationFault> {
                    #(#steps)*
                    ::std::result::Result::Ok(())
                }
            },
        ])
    }

    fn routine_step(&self, plans: &SynthesizedPlans, step: &RoutineStep) -> Result<TokenStream> {
        let runtime = &self.runtime;
        match step {
            RoutineStep::Check {
                property,
                accessor: path,
                instance,
                ..
            } => {
                let instance = ident(instance)?;
                let access = accessor(quote!(value), path)?;
                let member = format!("{{}}.{property}");
                Ok(quote! {
                    #runtime::check(&**#instance, &#access, &::std::format!(#member, path), results)?;
                })
            }
            RoutineStep::Delegate {
                accessor: path,
                ty,
                target,
                ..
            } => {
                let target = self.target(plans, target)?;
                let access = accessor(quote!(value), path)?;
                Ok(self.delegate(ty, quote!(&#access), &target))
            }
        }
    }
}
