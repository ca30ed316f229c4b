use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::container::container::Container;
use crate::container::error::{ContainerError, ContainerResult};
use crate::container::selector::Selector;
use crate::container::types::{DynBean, InstanceSupplier, Origin, TypeToken, Upcast, SINGLETON};

/// Immutable description of a component that has not been instantiated yet.
///
/// Registrations are built through [`RegistrationBuilder`] and never change afterwards;
/// [`Registration::with_updates`] derives a new value instead. Every registration can view
/// its bean as its declared type plus any type added with [`RegistrationBuilder::provides`].
#[derive(Clone)]
pub struct Registration {
    origin: Option<Origin>,
    name: Option<Arc<str>>,
    aliases: IndexSet<String>,
    ty: TypeToken,
    views: IndexMap<TypeToken, Upcast>,
    scope: Arc<str>,
    attributes: Map<String, Value>,
    instance_supplier: InstanceSupplier,
}

impl Registration {
    /// Runs `build` over a fresh builder and seals the result.
    pub fn of<F>(build: F) -> ContainerResult<Self>
    where
        F: FnOnce(&mut RegistrationBuilder),
    {
        let mut builder = RegistrationBuilder::new();
        build(&mut builder);
        builder.build()
    }

    /// Derives a new registration from this one; `self` is left untouched.
    pub fn with_updates<F>(&self, build: F) -> ContainerResult<Self>
    where
        F: FnOnce(&mut RegistrationBuilder),
    {
        let mut builder = RegistrationBuilder::from_registration(self);
        build(&mut builder);
        builder.build()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Explicit name, or the declared type's canonical name.
    pub fn name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.ty.name(),
        }
    }

    pub fn has_explicit_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn aliases(&self) -> &IndexSet<String> {
        &self.aliases
    }

    /// Name followed by the aliases, in declaration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_known_as(&self, identifier: &str) -> bool {
        self.identifiers().any(|known| known == identifier)
    }

    pub fn declared_type(&self) -> TypeToken {
        self.ty
    }

    /// Declared type first, then every additional type the bean is assignable to.
    pub fn provided_types(&self) -> impl Iterator<Item = TypeToken> + '_ {
        self.views.keys().copied()
    }

    pub fn can_provide(&self, token: &TypeToken) -> bool {
        self.views.contains_key(token)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.as_ref() == SINGLETON
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn instance_supplier(&self) -> &InstanceSupplier {
        &self.instance_supplier
    }

    /// Views `bean` as `Arc<T>` for a type this registration provides.
    pub(crate) fn view<T>(&self, bean: &DynBean) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        let view = self.views.get(&TypeToken::of::<T>())?;
        view(bean)?.downcast::<Arc<T>>().ok().map(|boxed| *boxed)
    }
}

impl PartialEq for Registration {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
            && self.name() == other.name()
            && self.name.is_some() == other.name.is_some()
            && self.aliases == other.aliases
            && self.ty == other.ty
            && self.views.keys().eq(other.views.keys())
            && self.scope == other.scope
            && self.attributes == other.attributes
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("origin", &self.origin)
            .field("name", &self.name())
            .field("aliases", &self.aliases)
            .field("type", &self.ty)
            .field("provides", &self.views.keys().collect::<Vec<_>>())
            .field("scope", &self.scope)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct SupplierSlot {
    ty: TypeToken,
    supplier: InstanceSupplier,
    view: Upcast,
}

#[derive(Clone)]
struct Capability {
    source: TypeToken,
    view: Upcast,
}

/// Mutable staging area for a [`Registration`]; discarded once sealed.
#[derive(Clone, Default)]
pub struct RegistrationBuilder {
    origin: Option<Origin>,
    name: Option<String>,
    aliases: IndexSet<String>,
    scope: Option<String>,
    attributes: Map<String, Value>,
    supplier: Option<SupplierSlot>,
    provides: IndexMap<TypeToken, Capability>,
}

impl RegistrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_registration(registration: &Registration) -> Self {
        let ty = registration.ty;
        let supplier = registration.views.get(&ty).map(|view| SupplierSlot {
            ty,
            supplier: Arc::clone(&registration.instance_supplier),
            view: Arc::clone(view),
        });
        let provides = registration
            .views
            .iter()
            .filter(|(token, _)| **token != ty)
            .map(|(token, view)| {
                (
                    *token,
                    Capability {
                        source: ty,
                        view: Arc::clone(view),
                    },
                )
            })
            .collect();

        Self {
            origin: registration.origin.clone(),
            name: registration.name.as_deref().map(str::to_owned),
            aliases: registration.aliases.clone(),
            scope: Some(registration.scope.to_string()),
            attributes: registration.attributes.clone(),
            supplier,
            provides,
        }
    }

    pub fn set_origin(&mut self, origin: impl Into<Origin>) -> &mut Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn clear_origin(&mut self) -> &mut Self {
        self.origin = None;
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Falls back to the declared type's name again.
    pub fn clear_name(&mut self) -> &mut Self {
        self.name = None;
        self
    }

    /// Replaces the aliases; order is kept and repeats collapse.
    pub fn set_aliases<I, S>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn set_scope(&mut self, scope: impl Into<String>) -> &mut Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Sets the factory and, with it, the declared type `T`.
    pub fn set_instance_supplier<T, F>(&mut self, supplier: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let erased: InstanceSupplier = Arc::new(move |container: &Container| {
            supplier(container).map(|bean| Arc::new(bean) as DynBean)
        });
        let view: Upcast = Arc::new(|bean: &DynBean| {
            Arc::clone(bean)
                .downcast::<T>()
                .ok()
                .map(|concrete| Box::new(concrete) as Box<dyn Any>)
        });
        self.supplier = Some(SupplierSlot {
            ty: TypeToken::of::<T>(),
            supplier: erased,
            view,
        });
        self
    }

    /// Builds `T` from the single bean matched by `selector`; see [`via`].
    pub fn set_instance_supplier_via<D, T, F>(
        &mut self,
        selector: Selector<D>,
        mapper: F,
    ) -> &mut Self
    where
        D: ?Sized + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<D>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.set_instance_supplier(via(selector, mapper))
    }

    /// Builds `T` from the single bean of type `D`; see [`via_type`].
    pub fn set_instance_supplier_via_type<D, T, F>(&mut self, mapper: F) -> &mut Self
    where
        D: ?Sized + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<D>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.set_instance_supplier(via_type(mapper))
    }

    /// Declares that beans of type `T` may also be selected as `I`.
    ///
    /// `upcast` is usually just `|bean| bean` with the target annotated, which lets the
    /// compiler perform the unsizing coercion to a trait object.
    pub fn provides<T, I, F>(&mut self, upcast: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let view: Upcast = Arc::new(move |bean: &DynBean| {
            Arc::clone(bean)
                .downcast::<T>()
                .ok()
                .map(|concrete| Box::new(upcast(concrete)) as Box<dyn Any>)
        });
        self.provides.insert(
            TypeToken::of::<I>(),
            Capability {
                source: TypeToken::of::<T>(),
                view,
            },
        );
        self
    }

    /// Seals the builder into an immutable registration.
    pub fn build(self) -> ContainerResult<Registration> {
        let Some(slot) = self.supplier else {
            return Err(ContainerError::invalid(format!(
                "no instance supplier set for {}",
                self.name.as_deref().unwrap_or("<unnamed>")
            )));
        };

        let mut views = IndexMap::with_capacity(self.provides.len() + 1);
        views.insert(slot.ty, slot.view);
        for (token, capability) in self.provides {
            if capability.source != slot.ty {
                return Err(ContainerError::invalid(format!(
                    "{token} is provided from {} but the supplier produces {}",
                    capability.source, slot.ty
                )));
            }
            views.entry(token).or_insert(capability.view);
        }

        Ok(Registration {
            origin: self.origin,
            name: self.name.map(Arc::from),
            aliases: self.aliases,
            ty: slot.ty,
            views,
            scope: Arc::from(self.scope.unwrap_or_else(|| SINGLETON.to_owned())),
            attributes: self.attributes,
            instance_supplier: slot.supplier,
        })
    }
}

/// Supplier that resolves the one bean matched by `selector` and maps it into `T`.
///
/// The dependency is looked up through `select(..).get()` each time the supplier runs, so
/// zero or several matches surface as the usual cardinality errors.
pub fn via<D, T, F>(
    selector: Selector<D>,
    mapper: F,
) -> impl Fn(&Container) -> ContainerResult<T> + Send + Sync + 'static
where
    D: ?Sized + 'static,
    T: 'static,
    F: Fn(Arc<D>) -> ContainerResult<T> + Send + Sync + 'static,
{
    move |container: &Container| mapper(container.select(&selector).get()?)
}

/// [`via`] with a plain type selector for `D`.
pub fn via_type<D, T, F>(
    mapper: F,
) -> impl Fn(&Container) -> ContainerResult<T> + Send + Sync + 'static
where
    D: ?Sized + 'static,
    T: 'static,
    F: Fn(Arc<D>) -> ContainerResult<T> + Send + Sync + 'static,
{
    via(Selector::<D>::for_type(), mapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    fn english() -> Registration {
        Registration::of(|b| {
            b.set_name("english")
                .set_aliases(["en", "default", "en"])
                .set_origin("tests::english")
                .set_attribute("weight", json!(3))
                .set_instance_supplier(|_| Ok(English))
                .provides::<English, dyn Greeter, _>(|bean| bean);
        })
        .unwrap()
    }

    #[test]
    fn name_defaults_to_type_name() {
        let registration = Registration::of(|b| {
            b.set_instance_supplier(|_| Ok(English));
        })
        .unwrap();
        assert_eq!(registration.name(), std::any::type_name::<English>());
        assert!(!registration.has_explicit_name());
        assert!(registration.aliases().is_empty());
        assert_eq!(registration.scope(), SINGLETON);
    }

    #[test]
    fn aliases_keep_order_and_collapse_repeats() {
        let registration = english();
        let aliases: Vec<&str> = registration.aliases().iter().map(String::as_str).collect();
        assert_eq!(aliases, ["en", "default"]);
        let ids: Vec<&str> = registration.identifiers().collect();
        assert_eq!(ids, ["english", "en", "default"]);
    }

    #[test]
    fn missing_supplier_is_rejected() {
        let err = Registration::of(|b| {
            b.set_name("empty");
        })
        .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidRegistration { .. }));
    }

    #[test]
    fn provides_must_come_from_supplier_type() {
        let err = Registration::of(|b| {
            b.set_instance_supplier(|_| Ok(7u32))
                .provides::<English, dyn Greeter, _>(|bean| bean);
        })
        .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidRegistration { .. }));
    }

    #[test]
    fn with_updates_changes_only_the_touched_field() {
        let original = english();
        let updated = original.with_updates(|b| {
            b.set_scope("x");
        })
        .unwrap();

        assert_eq!(updated.scope(), "x");
        assert_eq!(original.scope(), SINGLETON);
        assert_eq!(updated.name(), original.name());
        assert_eq!(updated.aliases(), original.aliases());
        assert_eq!(updated.origin(), original.origin());
        assert_eq!(updated.declared_type(), original.declared_type());
        assert_eq!(updated.attributes(), original.attributes());
        assert!(updated.can_provide(&TypeToken::of::<dyn Greeter>()));
        assert_ne!(updated, original);
        let restored = updated
            .with_updates(|b| {
                b.set_scope(SINGLETON);
            })
            .unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn same_inputs_build_equal_registrations() {
        assert_eq!(english(), english());
    }

    #[test]
    fn view_upcasts_to_declared_capability() {
        let registration = english();
        let bean: DynBean = Arc::new(English);
        let greeter = registration.view::<dyn Greeter>(&bean).unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(registration.view::<English>(&bean).is_some());
        assert!(registration.view::<u32>(&bean).is_none());
    }
}
