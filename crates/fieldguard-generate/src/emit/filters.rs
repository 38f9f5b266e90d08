use proc_macro2::TokenStream;
use quote::quote;

use fieldguard_core::TypeRef;
use fieldguard_introspect::TypeShape;
use fieldguard_plan::{CallSitePlan, ParameterStep, SynthesizedPlans};

use super::{Emitter, ident};
use crate::errors::{GenerationError, Result};

impl Emitter<'_> {
    /// Plan functions, the location table and the `WithValidation` trait.
    pub(super) fn filters(&self, plans: &SynthesizedPlans) -> Result<Vec<TokenStream>> {
        let runtime = &self.runtime;
        let mut items = plans
            .plans
            .iter()
            .map(|plan| self.plan_fn(plans, plan))
            .collect::<Result<Vec<_>>>()?;

        let mut entries = Vec::new();
        for plan in &plans.plans {
            let key = plan.key.as_str();
            let function = plan_ident(plan)?;
            entries.push(quote! { .plan(#key, #function) });
        }
        for plan in &plans.plans {
            let key = plan.key.as_str();
            for location in plan.locations() {
                let (file, line) = (&location.file, location.line);
                entries.push(quote! { .location(#file, #line, #key) });
            }
        }
        items.push(quote! {
            /// Plans of this program, keyed by handler signature and
            /// registration location.
            pub static PLANS: ::std::sync::LazyLock<#runtime::PlanTable> =
                ::std::sync::LazyLock::new(|| #runtime::PlanTable::builder() #(#entries)* .build());
        });

        items.push(quote! {
            /// Attaches the validation filter planned for the registration
            /// this call is written on.
            pub trait WithValidation: ::std::marker::Sized {
                fn with_validation(self) -> ::std::result::Result<Self, #runtime::ValidationFault>;
            }
        });
        items.push(quote! {
            impl<H: #runtime::FilterHost> WithValidation for H {
                #[track_caller]
                fn with_validation(mut self) -> ::std::result::Result<Self, #runtime::ValidationFault> {
                    let caller = ::std::panic::Location::caller();
                    #runtime::install(&mut self, &PLANS, caller.file(), caller.line())?;
                    ::std::result::Result::Ok(self)
                }
            }
        });
        Ok(items)
    }

    fn plan_fn(&self, plans: &SynthesizedPlans, plan: &CallSitePlan) -> Result<TokenStream> {
        let runtime = &self.runtime;
        let function = plan_ident(plan)?;
        let steps = plan
            .steps
            .iter()
            .map(|step| self.parameter_step(plans, step))
            .collect::<Result<Vec<_>>>()?;
        let doc = plan
            .sites
            .iter()
            .map(|site| format!(" {} `{}` at {}", site.method, site.route, site.location))
            .collect::<Vec<_>>();

        Ok(quote! {
            #(#[doc = #doc])*
            #[allow(unused_variables, unused_mut)]
            fn #function(
                context: &#runtime::InvocationContext,
            ) -> ::std::result::Result<::std::vec::Vec<#runtime::ValidationResult>, #runtime::ValidationFault> {
                let mut collected = ::std::vec::Vec::new();
                let results = &mut collected;
                #(#steps)*
                ::std::result::Result::Ok(collected)
            }
        })
    }

    fn parameter_step(&self, plans: &SynthesizedPlans, step: &ParameterStep) -> Result<TokenStream> {
        let runtime = &self.runtime;
        match step {
            ParameterStep::Check { index, name, ty, rules } => {
                let declared = self.type_tokens(ty)?;
                let checks = rules
                    .iter()
                    .map(|annotation| {
                        let rule = self.catalog.lookup(&annotation.kind).ok_or_else(|| {
                            GenerationError::InvalidPlan(format!(
                                "parameter `{name}` uses unregistered rule `{}`",
                                annotation.kind
                            ))
                        })?;
                        let rule = self.rule_expr(&rule.rule_type, rule.builtin, &annotation.args)?;
                        Ok(quote! { #runtime::check(&#rule, value, #name, results)?; })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(quote! {
                    {
                        let value = context.get::<#declared>(#index)?;
                        #(#checks)*
                    }
                })
            }
            ParameterStep::Delegate { index, ty, target, .. } => {
                let target = self.target(plans, target)?;
                if self.is_exact(ty) {
                    let validate = &target.validate;
                    return Ok(quote! { #validate(context.argument(#index)?, results)?; });
                }
                let declared = self.type_tokens(ty)?;
                let body = self.delegate(ty, quote!(value), &target);
                Ok(quote! {
                    {
                        let value = context.get::<#declared>(#index)?;
                        #body
                    }
                })
            }
        }
    }

    /// The parameter is the element type itself, so the exact-type routine
    /// applies.
    fn is_exact(&self, ty: &TypeRef) -> bool {
        matches!(self.shapes.classify(ty), TypeShape::Single)
    }
}

fn plan_ident(plan: &CallSitePlan) -> Result<proc_macro2::Ident> {
    ident(&format!("plan_{}", plan.key.as_str()))
}
