use proc_macro2::TokenStream;
use quote::quote;

use fieldguard_plan::SynthesizedPlans;

use super::{Emitter, ident};
use crate::errors::Result;

impl Emitter<'_> {
    /// One lazily built static per validator instance, in canonical order.
    pub(super) fn instances(&self, plans: &SynthesizedPlans) -> Result<Vec<TokenStream>> {
        let runtime = &self.runtime;
        plans
            .instances
            .iter()
            .map(|instance| {
                let name = ident(&instance.name)?;
                let rule = self.rule_expr(&instance.rule_type, instance.builtin, &instance.args)?;
                let doc = format!(
                    " `{}` on {}.{}",
                    instance.kind, instance.type_name, instance.property
                );
                Ok(quote! {
                    #[doc = #doc]
                    pub static #name: ::std::sync::LazyLock<::std::boxed::Box<dyn #runtime::ValidationRule>> =
                        ::std::sync::LazyLock::new(|| ::std::boxed::Box::new(#rule));
                })
            })
            .collect()
    }
}
