use solstice_di::catalog::signature::{ParameterDescriptor, Signature};
use solstice_di::catalog::{TypeCatalog, TypeDescriptor};
use solstice_di::container::Event;
use solstice_di::error::ErrorPtr;
use solstice_di::value::{Arguments, Value};
use solstice_di::CoreBuilder;
use std::sync::Arc;

struct Calculator;

// interceptors are regular services
struct Logger;

//noinspection DuplicatedCode
// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // types can also be registered manually in a catalog, instead of statically
    let catalog = TypeCatalog::new(false)
        .with_type(
            TypeDescriptor::builder::<Calculator>()
                .named("example::Calculator")
                .constructor(|_| Ok(Calculator))
                .method(
                    "divide",
                    Signature::new()
                        .with(ParameterDescriptor::required("a"))
                        .with(ParameterDescriptor::required("b")),
                    |_, arguments| {
                        let a: i64 = arguments.get("a")?;
                        let b: i64 = arguments.get("b")?;
                        a.checked_div(b)
                            .map(Value::Int)
                            .ok_or_else(|| "division by zero".into())
                    },
                )
                .build(),
        )
        .and_then(|catalog| {
            catalog.with_type(
                TypeDescriptor::builder::<Logger>()
                    .named("example::Logger")
                    .constructor(|_| Ok(Logger))
                    .method("before", Signature::new(), |_, _| {
                        println!("Dividing...");
                        Ok(Value::None)
                    })
                    .method("after", Signature::new(), |_, _| {
                        println!("Divided.");
                        Ok(Value::None)
                    })
                    // error interceptors receive the error, followed by the original arguments
                    .method(
                        "error",
                        Signature::new()
                            .with(ParameterDescriptor::required("error"))
                            .with(ParameterDescriptor::var_positional("args")),
                        |_, arguments| {
                            let error: ErrorPtr = arguments.get("error")?;
                            println!("Cannot divide {:?}: {error}", arguments.rest());
                            Ok(Value::None)
                        },
                    )
                    .build(),
            )
        })
        .expect("error registering types");

    let core = CoreBuilder::new()
        .expect("error creating core builder")
        .with_type_resolver(Arc::new(catalog))
        .build();

    core.define_entity("calculator", "example::Calculator", |_| Ok(()))
        .expect("error defining calculator");

    // interceptions are declared by the intercepting service
    core.define_entity("logger", "example::Logger", |context| {
        context
            .intercept(Event::Before, "calculator", "divide", "before")
            .intercept(Event::After, "calculator", "divide", "after")
            .intercept(Event::Error, "calculator", "divide", "error");
        Ok(())
    })
    .expect("error defining logger");

    let calculator = core.get("calculator").expect("error creating calculator");
    let calculator = calculator
        .as_service()
        .expect("calculator should be a service");

    // prints "Dividing...", "Divided." and then "4"
    let result = calculator
        .call("divide", Arguments::new().with(8).with(2))
        .expect("error dividing");
    println!("{result}");

    // prints "Dividing...", the error message from the interceptor and then the error itself
    if let Err(error) = calculator.call("divide", Arguments::new().with(1).with(0)) {
        println!("Error: {error}");
    }
}
