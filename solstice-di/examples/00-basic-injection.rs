use solstice_di::catalog::internal::{submit, TypeRegisterer};
use solstice_di::catalog::signature::{Annotation, ParameterDescriptor, Signature};
use solstice_di::catalog::{TypeDescriptor, TypeDescriptorPtr};
use solstice_di::value::{Arguments, Value};
use solstice_di::Core;
use std::sync::Arc;

// this is a dependency we would like to inject
struct Greeting {
    text: String,
}

// this is a service with a dependency
struct Greeter {
    greeting: Arc<Greeting>,
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        format!("{}, {name}!", self.greeting.text)
    }
}

// since there's no runtime reflection, the container needs to be told how to build our types and
// which methods can be called by name
fn greeting_descriptor() -> TypeDescriptorPtr {
    TypeDescriptor::builder::<Greeting>()
        .named("example::Greeting")
        .signature(Signature::new().with(ParameterDescriptor::optional("text", "Hello")))
        .constructor(|arguments| {
            Ok(Greeting {
                text: arguments.get("text")?,
            })
        })
        .build()
}

fn greeter_descriptor() -> TypeDescriptorPtr {
    TypeDescriptor::builder::<Greeter>()
        .named("example::Greeter")
        // the annotation allows auto-wiring the greeting, if not given explicitly
        .signature(Signature::new().with(
            ParameterDescriptor::required("greeting")
                .annotated(Annotation::Service("example::Greeting".to_string())),
        ))
        .constructor(|arguments| {
            Ok(Greeter {
                greeting: arguments.service("greeting")?,
            })
        })
        .method(
            "greet",
            Signature::new().with(ParameterDescriptor::required("name")),
            |greeter, arguments| Ok(Value::Str(greeter.greet(&arguments.get::<String>("name")?))),
        )
        .build()
}

// descriptors submitted statically are available to all cores created with default configuration
submit! {
    TypeRegisterer { register: greeting_descriptor }
}

submit! {
    TypeRegisterer { register: greeter_descriptor }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let core = Core::new().expect("error creating core");

    // by default, auto-wired services are looked up by their fully-qualified type names
    core.define_entity("example::Greeting", "example::Greeting", |context| {
        context.set_param("Hi", Some("text"))?;
        Ok(())
    })
    .expect("error defining greeting");

    // no parameters given - the greeting will be auto-wired
    core.define_entity("greeter", "example::Greeter", |_| Ok(()))
        .expect("error defining greeter");

    // services can be accessed directly...
    let greeter = core
        .instance::<Greeter>("greeter")
        .expect("error creating greeter");

    // prints "Hi, direct!"
    println!("{}", greeter.greet("direct"));

    // ...or by calling their methods by name
    let greeting = core
        .get("greeter")
        .expect("error creating greeter")
        .as_service()
        .expect("greeter should be a service")
        .call("greet", Arguments::new().with("dynamic"))
        .expect("error calling greet");

    // prints "Hi, dynamic!"
    println!("{greeting}");
}
